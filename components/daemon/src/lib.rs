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

//! Runtime configuration of the lazy pulling filesystem daemon.
//!
//! A [DaemonConfig] is loaded from a template by [new_daemon_config],
//! completed with what is only known at mount time by
//! [supplement::Supplementer], and then either written out in full with
//! [DaemonConfig::dump_string] for the daemon, or logged through
//! [redact::dump_redacted_string] which never contains credentials.

pub mod auth;
pub mod backend;
pub mod err;
pub mod fscache;
pub mod fuse;
pub mod mirrors;
pub mod redact;
pub mod registry;
pub mod settings;
pub mod supplement;

use std::{collections::HashMap, fmt, path::Path, str::FromStr};

pub use backend::{BackendConfig, BackendType, DeviceConfig, MirrorConfig};
pub use err::{Error, Result};
use lazycfg_common::{FS_DRIVER_FSCACHE, FS_DRIVER_FUSEDEV};
use serde::Serialize;
use snafu::ResultExt;
use tracing::info;

use crate::{
    auth::PassKeyChain,
    err::{SerializationSnafu, TemplateDecodeSnafu, TemplateLoadSnafu, UnsupportedDriverSnafu},
    fscache::FscacheDaemonConfig,
    fuse::FuseDaemonConfig,
    mirrors::MirrorsDir,
    redact::{Field, Redact},
};

/// How the daemon exposes the filesystem, which decides the shape of its
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsDriver {
    Fusedev,
    Fscache,
}

impl FsDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fusedev => FS_DRIVER_FUSEDEV,
            Self::Fscache => FS_DRIVER_FSCACHE,
        }
    }

    /// Where the backend type tag lives in a template of this driver.
    fn backend_type_pointer(&self) -> &'static str {
        match self {
            Self::Fusedev => "/device/backend/type",
            Self::Fscache => "/config/backend_type",
        }
    }
}

impl fmt::Display for FsDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for FsDriver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            FS_DRIVER_FUSEDEV => Ok(Self::Fusedev),
            FS_DRIVER_FSCACHE => Ok(Self::Fscache),
            other => UnsupportedDriverSnafu { driver: other }.fail(),
        }
    }
}

/// The configuration of one daemon instance, owned by the mount or snapshot
/// request which created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DaemonConfig {
    Fuse(FuseDaemonConfig),
    Fscache(FscacheDaemonConfig),
}

/// Load the template at `template` as the configuration of `driver`.
pub fn new_daemon_config(driver: &str, template: impl AsRef<Path>) -> Result<DaemonConfig> {
    let driver: FsDriver = driver.parse()?;
    let path = template.as_ref();
    let content = std::fs::read_to_string(path).context(TemplateLoadSnafu { path })?;
    let config = DaemonConfig::decode(driver, &content, &path.display().to_string())?;
    info!(%driver, template = %path.display(), "loaded daemon config template");
    Ok(config)
}

/// Serialize any value as JSON, secrets included.
pub fn dump_config_string<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context(SerializationSnafu)
}

impl DaemonConfig {
    /// Parse a template held in memory.
    pub fn from_json(driver: FsDriver, content: &str) -> Result<Self> {
        Self::decode(driver, content, "<inline>")
    }

    fn decode(driver: FsDriver, content: &str, template: &str) -> Result<Self> {
        let raw: serde_json::Value =
            serde_json::from_str(content).context(TemplateDecodeSnafu { template })?;
        // Reject unknown backends by name before the typed decode hides them
        // behind a generic serde error.
        if let Some(kind) = raw
            .pointer(driver.backend_type_pointer())
            .and_then(serde_json::Value::as_str)
        {
            kind.parse::<BackendType>()?;
        }
        let config = match driver {
            FsDriver::Fusedev => {
                Self::Fuse(serde_json::from_value(raw).context(TemplateDecodeSnafu { template })?)
            }
            FsDriver::Fscache => {
                Self::Fscache(serde_json::from_value(raw).context(TemplateDecodeSnafu { template })?)
            }
        };
        Ok(config)
    }

    pub fn driver(&self) -> FsDriver {
        match self {
            Self::Fuse(_) => FsDriver::Fusedev,
            Self::Fscache(_) => FsDriver::Fscache,
        }
    }

    /// Fill what is needed to reach the registry, except credentials.
    pub fn supplement(&mut self, host: &str, repo: &str, snapshot_id: &str, params: &HashMap<String, String>) {
        match self {
            Self::Fuse(c) => c.supplement(host, repo, snapshot_id, params),
            Self::Fscache(c) => c.supplement(host, repo, snapshot_id, params),
        }
    }

    pub fn fill_auth(&mut self, keychain: Option<&PassKeyChain>) {
        match self {
            Self::Fuse(c) => c.fill_auth(keychain),
            Self::Fscache(c) => c.fill_auth(keychain),
        }
    }

    pub fn storage_backend(&self) -> (BackendType, &BackendConfig) {
        match self {
            Self::Fuse(c) => c.storage_backend(),
            Self::Fscache(c) => c.storage_backend(),
        }
    }

    pub fn update_mirrors(&mut self, mirrors_dir: &MirrorsDir, registry_host: &str) -> Result<()> {
        match self {
            Self::Fuse(c) => c.update_mirrors(mirrors_dir, registry_host),
            Self::Fscache(c) => c.update_mirrors(mirrors_dir, registry_host),
        }
    }

    /// The full configuration, credentials included. Only for the file the
    /// daemon reads, never for logs.
    pub fn dump_string(&self) -> Result<String> { dump_config_string(self) }
}

impl Redact for DaemonConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        match self {
            Self::Fuse(c) => c.fields(),
            Self::Fscache(c) => c.fields(),
        }
    }
}
