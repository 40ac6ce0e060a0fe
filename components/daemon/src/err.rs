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

use snafu::{Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("unsupported fs driver {driver:?}"))]
    UnsupportedDriver {
        #[snafu(implicit)]
        location: Location,
        driver:   String,
    },

    // ====Template====
    #[snafu(display("failed to read daemon config template {}", path.display()))]
    TemplateLoad {
        #[snafu(implicit)]
        location: Location,
        path:     PathBuf,
        source:   std::io::Error,
    },
    #[snafu(display("failed to decode daemon config template {template}"))]
    TemplateDecode {
        #[snafu(implicit)]
        location: Location,
        template: String,
        source:   serde_json::Error,
    },
    #[snafu(display("unsupported storage backend type {kind:?}"))]
    UnsupportedBackend {
        #[snafu(implicit)]
        location: Location,
        kind:     String,
    },

    // ====Supplement====
    #[snafu(display("invalid image reference {image:?}: {reason}"))]
    ImageReference {
        #[snafu(implicit)]
        location: Location,
        image:    String,
        reason:   String,
    },
    #[snafu(display("failed to update mirrors for registry {host}"))]
    MirrorUpdate {
        #[snafu(implicit)]
        location: Location,
        host:     String,
        #[snafu(source(from(Error, Box::new)))]
        source:   Box<Error>,
    },
    #[snafu(display("registry host {host:?} does not name a mirrors entry"))]
    MirrorsHost {
        #[snafu(implicit)]
        location: Location,
        host:     String,
    },
    #[snafu(display("failed to read mirrors config {}", path.display()))]
    MirrorsRead {
        #[snafu(implicit)]
        location: Location,
        path:     PathBuf,
        source:   std::io::Error,
    },
    #[snafu(display("malformed mirrors config {}", path.display()))]
    MirrorsDecode {
        #[snafu(implicit)]
        location: Location,
        path:     PathBuf,
        source:   toml::de::Error,
    },

    #[snafu(display("failed to serialize daemon config"))]
    Serialization {
        #[snafu(implicit)]
        location: Location,
        source:   serde_json::Error,
    },

    // ====Settings====
    #[snafu(display("failed to read settings {}", path.display()))]
    SettingsLoad {
        #[snafu(implicit)]
        location: Location,
        path:     PathBuf,
        source:   std::io::Error,
    },
    #[snafu(display("malformed settings {}", path.display()))]
    SettingsDecode {
        #[snafu(implicit)]
        location: Location,
        path:     PathBuf,
        source:   toml::de::Error,
    },
    #[snafu(display("failed to read settings from environment"))]
    SettingsEnv {
        #[snafu(implicit)]
        location: Location,
        source:   snafu::Whatever,
    },
}

impl Error {
    pub fn is_unsupported_backend(&self) -> bool { matches!(self, Error::UnsupportedBackend { .. }) }

    pub fn is_image_reference(&self) -> bool { matches!(self, Error::ImageReference { .. }) }

    pub fn is_mirror_update(&self) -> bool { matches!(self, Error::MirrorUpdate { .. }) }
}
