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

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    auth::{DockerConfigKeychain, KeychainChain, KeychainProvider, LabelKeychain},
    backend::BackendType,
    err::{MirrorUpdateSnafu, Result},
    mirrors::MirrorsDir,
    registry::{DefaultHostRewrite, HostRewrite, ImageReference},
    settings::Settings,
    DaemonConfig,
};

/// What a mount or snapshot request knows about the image it serves.
pub trait SupplementInfo {
    fn image_id(&self) -> &str;
    fn snapshot_id(&self) -> &str;
    fn is_vpc_registry(&self) -> bool;
    fn labels(&self) -> &HashMap<String, String>;
    fn params(&self) -> &HashMap<String, String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub image_id:     String,
    pub snapshot_id:  String,
    pub vpc_registry: bool,
    pub labels:       HashMap<String, String>,
    pub params:       HashMap<String, String>,
}

impl SnapshotRequest {
    pub fn new(image_id: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            snapshot_id: snapshot_id.into(),
            ..Default::default()
        }
    }

    pub fn with_vpc_registry(mut self, vpc_registry: bool) -> Self {
        self.vpc_registry = vpc_registry;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl SupplementInfo for SnapshotRequest {
    fn image_id(&self) -> &str { &self.image_id }

    fn snapshot_id(&self) -> &str { &self.snapshot_id }

    fn is_vpc_registry(&self) -> bool { self.vpc_registry }

    fn labels(&self) -> &HashMap<String, String> { &self.labels }

    fn params(&self) -> &HashMap<String, String> { &self.params }
}

/// Completes daemon configurations with registry, mirror and credential
/// data. Share one instance between all requests: its lock admits a single
/// supplement at a time, and the mirrors directory is only reachable
/// while holding it.
pub struct Supplementer {
    mirrors_dir: Mutex<MirrorsDir>,
    keychains:   Box<dyn KeychainProvider>,
    hosts:       Box<dyn HostRewrite>,
}

impl Supplementer {
    /// Credentials come from the snapshot labels, hosts are rewritten by
    /// [DefaultHostRewrite].
    pub fn new(mirrors_dir: MirrorsDir) -> Self {
        Self {
            mirrors_dir: Mutex::new(mirrors_dir),
            keychains:   Box::new(KeychainChain::new().with(LabelKeychain)),
            hosts:       Box::new(DefaultHostRewrite),
        }
    }

    /// Mirrors from the configured directory, credentials from the labels
    /// then the docker config file.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut keychains = KeychainChain::new().with(LabelKeychain);
        if let Some(path) = &settings.docker_config_path {
            let docker = DockerConfigKeychain::new(path);
            debug!(path = %docker.path().display(), "use docker config credentials");
            keychains = keychains.with(docker);
        }
        Self::new(MirrorsDir::resolve(settings)).with_keychain_provider(keychains)
    }

    pub fn with_keychain_provider(mut self, provider: impl KeychainProvider + 'static) -> Self {
        self.keychains = Box::new(provider);
        self
    }

    pub fn with_host_rewrite(mut self, hosts: impl HostRewrite + 'static) -> Self {
        self.hosts = Box::new(hosts);
        self
    }

    /// The host mirrors and credentials are resolved for.
    pub fn effective_host(&self, parsed_host: &str, vpc_registry: bool) -> String {
        if vpc_registry {
            self.hosts.vpc_host(parsed_host)
        } else {
            self.hosts.canonical_host(parsed_host)
        }
    }

    /// Fill `config` with what is only known for this request. Localfs and
    /// oss templates are complete already and stay untouched.
    ///
    /// Registry data is written only once the effective host is known and
    /// its mirrors loaded, so any error leaves `config` as it was.
    pub fn supplement_daemon_config(&self, config: &mut DaemonConfig, info: &impl SupplementInfo) -> Result<()> {
        let mirrors_dir = self.mirrors_dir.lock().unwrap_or_else(PoisonError::into_inner);

        let image = ImageReference::parse(info.image_id())?;
        let (backend_type, _) = config.storage_backend();

        match backend_type {
            BackendType::Registry => {
                let registry_host = self.effective_host(&image.host, info.is_vpc_registry());
                debug!(
                    image = info.image_id(),
                    parsed_host = %image.host,
                    %registry_host,
                    vpc = info.is_vpc_registry(),
                    "resolved registry host"
                );

                config
                    .update_mirrors(&mirrors_dir, &registry_host)
                    .context(MirrorUpdateSnafu {
                        host: registry_host.as_str(),
                    })?;

                // Without credentials, the auth of the template is kept: a
                // public repository needs none.
                let keychain = self
                    .keychains
                    .keychain(&registry_host, info.image_id(), info.labels());
                config.supplement(&registry_host, &image.repo, info.snapshot_id(), info.params());
                config.fill_auth(keychain.as_ref());

                info!(
                    image = info.image_id(),
                    snapshot_id = info.snapshot_id(),
                    %registry_host,
                    repo = %image.repo,
                    with_auth = keychain.is_some(),
                    "supplemented daemon config"
                );
            }
            BackendType::Localfs | BackendType::Oss => {
                debug!(%backend_type, image = info.image_id(), "backend needs no supplement");
            }
        }

        Ok(())
    }
}
