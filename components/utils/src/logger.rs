// Copyright 2024 lazycfg
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::Path, sync::Once};

use lazycfg_common::{DEFAULT_LOG_DIR, ENV_LOG};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Whatever};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Options for the process wide tracing subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingOptions {
    /// A directory to create rolling log files in. Empty disables file
    /// logging.
    pub dir:           String,
    /// The default filter directive, overridden by `LAZYCFG_LOG` when set.
    pub level:         Option<String>,
    /// Whether to duplicate logs to stdout.
    pub append_stdout: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            dir:           DEFAULT_LOG_DIR.to_string(),
            level:         None,
            append_stdout: true,
        }
    }
}

/// Install the global subscriber described by `opts`.
///
/// The returned guards flush the non-blocking file writer when dropped, so
/// the caller must keep them alive for as long as it logs.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, Whatever> {
    let level = opts.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    // Don't create the files or subscribers if we'll never emit any logs
    if create_env_filter(level).max_level_hint() == Some(LevelFilter::OFF) {
        return Ok(vec![]);
    }

    let mut guards = vec![];

    let stdout_layer = if opts.append_stdout {
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(supports_color::on(supports_color::Stream::Stdout).is_some())
            .with_filter(create_env_filter(level));
        Some(layer)
    } else {
        None
    };

    let file_layer = if !opts.dir.is_empty() {
        std::fs::create_dir_all(Path::new(&opts.dir)).with_whatever_context(|e| {
            format!("failed to create log directory {}: {e}", opts.dir)
        })?;
        let appender = tracing_appender::rolling::daily(&opts.dir, app_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(create_env_filter(level));
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .with_whatever_context(|e| format!("failed to install tracing subscriber: {e}"))?;

    Ok(guards)
}

/// Install a plain stdout subscriber once per process; used by tests.
pub fn install_fmt_log() {
    static START: Once = Once::new();
    START.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(create_env_filter("debug"))
            .with_test_writer()
            .try_init();
    });
}

/// [EnvFilter] isn't [Clone], so every layer builds its own.
fn create_env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_options_keep_defaults() {
        let opts: LoggingOptions = serde_json::from_str(r#"{"level":"debug"}"#).unwrap();
        assert_eq!(opts.level.as_deref(), Some("debug"));
        assert_eq!(opts.dir, "/tmp/lazycfg");
        assert!(opts.append_stdout);
    }

    #[test]
    fn install_twice_is_harmless() {
        install_fmt_log();
        install_fmt_log();
        tracing::debug!("still alive");
    }
}
