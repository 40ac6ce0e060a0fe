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

mod build_info;
mod cmd;

use clap::{Parser, Subcommand};
use snafu::Whatever;

use crate::cmd::{inspect::InspectArgs, render::RenderArgs};

#[derive(Debug, Parser)]
#[clap(
name = "lazycfg",
about = "daemon configuration synthesis for lazy pulling filesystems",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Render(RenderArgs),
    Inspect(InspectArgs),
}

fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    match cli.commands {
        Commands::Render(render_args) => render_args.run(),
        Commands::Inspect(inspect_args) => inspect_args.run(),
    }
}
