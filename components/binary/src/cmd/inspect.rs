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

use clap::Args;
use lazycfg_daemon::redact::redact;
use snafu::{ResultExt, Whatever};

use super::TemplateArgs;

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Print a daemon configuration template with every credential removed.
Examples:

lazycfg inspect --driver fusedev --template /etc/lazycfg/fusedev.json
")]
pub struct InspectArgs {
    #[command(flatten)]
    pub template: TemplateArgs,
}

impl InspectArgs {
    pub fn run(self) -> Result<(), Whatever> {
        let config = self.template.load()?;
        let redacted = redact(&config).with_whatever_context(|e| format!("failed to redact config: {e}"))?;
        let pretty = serde_json::to_string_pretty(&redacted)
            .with_whatever_context(|e| format!("failed to encode config: {e}"))?;
        println!("{pretty}");
        Ok(())
    }
}
