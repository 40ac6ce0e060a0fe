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

use std::path::PathBuf;

use clap::Args;
use lazycfg_common::LAZYCFG;
use lazycfg_daemon::{
    redact::dump_redacted_string,
    settings::Settings,
    supplement::{SnapshotRequest, Supplementer},
};
use snafu::{ResultExt, Whatever};
use tracing::info;

use super::{parse_key_val, TemplateArgs};
use crate::build_info;

const IMAGE_OPTIONS_HEADER: &str = "Image options";
const LOGGING_OPTIONS_HEADER: &str = "Logging options";

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Complete a daemon configuration template for an image and write the
configuration the daemon reads.
Examples:

lazycfg render --template /etc/lazycfg/fusedev.json \
    --image docker.io/library/busybox:latest --output /run/lazycfg/1.json
")]
pub struct RenderArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    #[arg(
        long,
        help = "Settings file of lazycfg",
        value_name = "FILE"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Image reference to serve",
        help_heading = IMAGE_OPTIONS_HEADER,
        value_name = "REFERENCE",
    )]
    pub image: String,

    #[arg(
        long,
        help = "Snapshot id of the mount",
        help_heading = IMAGE_OPTIONS_HEADER,
        default_value = "",
    )]
    pub snapshot_id: String,

    #[arg(
        long,
        help = "The registry is reached through its VPC host",
        help_heading = IMAGE_OPTIONS_HEADER,
    )]
    pub vpc: bool,

    #[arg(
        long = "label",
        help = "Snapshot label, may be repeated",
        help_heading = IMAGE_OPTIONS_HEADER,
        value_name = "KEY=VALUE",
        value_parser = parse_key_val,
    )]
    pub labels: Vec<(String, String)>,

    #[arg(
        long = "param",
        help = "Request parameter, may be repeated",
        help_heading = IMAGE_OPTIONS_HEADER,
        value_name = "KEY=VALUE",
        value_parser = parse_key_val,
    )]
    pub params: Vec<(String, String)>,

    #[arg(
        long,
        short,
        help = "Write the configuration to a file [default: stdout]",
        value_name = "FILE"
    )]
    pub output: Option<PathBuf>,

    #[clap(
        long,
        help = "Write log files to a directory [default: from settings]",
        help_heading = LOGGING_OPTIONS_HEADER,
        value_name = "DIRECTORY",
    )]
    pub log_directory: Option<String>,

    #[clap(
        short,
        long,
        help = "Log level",
        help_heading = LOGGING_OPTIONS_HEADER,
        value_name = "LEVEL",
    )]
    pub level: Option<String>,

    #[clap(
        long,
        help = "Disable all logging",
        help_heading = LOGGING_OPTIONS_HEADER,
        conflicts_with_all(["log_directory", "level"])
    )]
    pub no_log: bool,
}

impl RenderArgs {
    fn load_settings(&self) -> Result<Settings, Whatever> {
        let mut settings = Settings::load(self.config.as_deref())
            .with_whatever_context(|e| format!("failed to load settings: {e}"))?;
        if let Some(dir) = &self.log_directory {
            settings.logging.dir = dir.clone();
        }
        if self.level.is_some() {
            settings.logging.level = self.level.clone();
        }
        // stdout may carry the configuration itself
        if self.output.is_none() {
            settings.logging.append_stdout = false;
        }
        Ok(settings)
    }

    fn snapshot_request(&self) -> SnapshotRequest {
        let mut req = SnapshotRequest::new(self.image.as_str(), self.snapshot_id.as_str()).with_vpc_registry(self.vpc);
        for (key, value) in &self.labels {
            req = req.with_label(key.as_str(), value.as_str());
        }
        for (key, value) in &self.params {
            req = req.with_param(key.as_str(), value.as_str());
        }
        req
    }

    pub fn run(self) -> Result<(), Whatever> {
        let settings = self.load_settings()?;
        let _guards = if self.no_log {
            vec![]
        } else {
            lazycfg_utils::logger::init_global_logging(LAZYCFG, &settings.logging)?
        };
        info!(
            "PKG_VERSION: {}, FULL_VERSION: {}",
            build_info::PKG_VERSION,
            build_info::FULL_VERSION,
        );

        let mut config = self.template.load()?;
        let supplementer = Supplementer::from_settings(&settings);
        let req = self.snapshot_request();
        supplementer
            .supplement_daemon_config(&mut config, &req)
            .with_whatever_context(|e| format!("failed to supplement config for {}: {e}", self.image))?;

        let redacted =
            dump_redacted_string(&config).with_whatever_context(|e| format!("failed to redact config: {e}"))?;
        info!(config = %redacted, "rendered daemon config");

        let full = config
            .dump_string()
            .with_whatever_context(|e| format!("failed to encode config: {e}"))?;
        match &self.output {
            Some(path) => std::fs::write(path, full)
                .with_whatever_context(|e| format!("failed to write {}: {e}", path.display()))?,
            None => println!("{full}"),
        }
        Ok(())
    }
}
