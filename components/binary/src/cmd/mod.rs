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

pub mod inspect;
pub mod render;

use std::path::PathBuf;

use clap::Args;
use lazycfg_common::{FS_DRIVER_FSCACHE, FS_DRIVER_FUSEDEV};
use lazycfg_daemon::{new_daemon_config, DaemonConfig};
use snafu::{ResultExt, Whatever};

const TEMPLATE_OPTIONS_HEADER: &str = "Template options";

#[derive(Debug, Clone, Args)]
pub struct TemplateArgs {
    #[arg(
        long,
        help = "Filesystem driver of the daemon",
        help_heading = TEMPLATE_OPTIONS_HEADER,
        value_parser = [FS_DRIVER_FUSEDEV, FS_DRIVER_FSCACHE],
        default_value = FS_DRIVER_FUSEDEV,
    )]
    pub driver: String,

    #[arg(
        long,
        help = "Daemon configuration template",
        help_heading = TEMPLATE_OPTIONS_HEADER,
        value_name = "FILE",
    )]
    pub template: PathBuf,
}

impl TemplateArgs {
    fn load(&self) -> Result<DaemonConfig, Whatever> {
        new_daemon_config(&self.driver, &self.template).with_whatever_context(|e| {
            format!("failed to load template {}: {e}", self.template.display())
        })
    }
}

/// Parse a `KEY=VALUE` argument.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid KEY=VALUE: no `=` found in {s:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val() {
        assert_eq!(
            parse_key_val("containerd.io/snapshot/pullusername=bot").unwrap(),
            ("containerd.io/snapshot/pullusername".to_string(), "bot".to_string())
        );
        assert_eq!(parse_key_val("k=a=b").unwrap(), ("k".to_string(), "a=b".to_string()));
        assert_eq!(parse_key_val("k=").unwrap(), ("k".to_string(), String::new()));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=v").is_err());
    }
}
