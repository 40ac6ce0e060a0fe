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

use std::collections::HashMap;

use lazycfg_common::{PARAM_BOOTSTRAP, PARAM_CACHE_DIR, PARAM_DOMAIN_ID};
use serde::{Deserialize, Serialize};

use crate::{
    auth::PassKeyChain,
    backend::{BackendConfig, BackendType},
    err::Result,
    fuse::FsPrefetch,
    mirrors::MirrorsDir,
    redact::{Field, Redact},
};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FscacheCacheConfig {
    pub work_dir: String,
}

impl Redact for FscacheCacheConfig {
    fn fields(&self) -> Vec<Field<'_>> { vec![Field::literal("work_dir", &self.work_dir)] }
}

/// The device of an fscache daemon, with backend and cache policy laid out
/// the way the fscache daemon reads them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FscacheDeviceConfig {
    pub backend_type:   BackendType,
    #[serde(default)]
    pub backend_config: BackendConfig,
    #[serde(default)]
    pub cache_type:     String,
    #[serde(default)]
    pub cache_config:   FscacheCacheConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch:       Option<FsPrefetch>,
    #[serde(default)]
    pub metadata_path:  String,
}

impl Redact for FscacheDeviceConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::plain("backend_type", &self.backend_type),
            Field::nested("backend_config", &self.backend_config),
            Field::literal("cache_type", &self.cache_type),
            Field::nested("cache_config", &self.cache_config),
            Field::optional("prefetch", self.prefetch.as_ref()),
            Field::literal("metadata_path", &self.metadata_path),
        ]
    }
}

/// Configuration of a daemon serving through the kernel fscache.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FscacheDaemonConfig {
    /// Kind of the blob, `bootstrap` for images.
    #[serde(rename = "type", default)]
    pub blob_type:   String,
    /// Filled with the snapshot id.
    #[serde(default)]
    pub id:          String,
    #[serde(default)]
    pub domain_id:   String,
    pub config:      FscacheDeviceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_prefetch: Option<FsPrefetch>,
}

impl FscacheDaemonConfig {
    pub fn supplement(&mut self, host: &str, repo: &str, snapshot_id: &str, params: &HashMap<String, String>) {
        let backend = &mut self.config.backend_config;
        if !host.is_empty() {
            backend.host = host.to_string();
        }
        if !repo.is_empty() {
            backend.repo = repo.to_string();
        }
        self.id = snapshot_id.to_string();

        if let Some(cache_dir) = params.get(PARAM_CACHE_DIR) {
            self.config.cache_config.work_dir = cache_dir.clone();
        }
        if let Some(bootstrap) = params.get(PARAM_BOOTSTRAP) {
            self.config.metadata_path = bootstrap.clone();
        }
        if let Some(domain_id) = params.get(PARAM_DOMAIN_ID) {
            self.domain_id = domain_id.clone();
        }
    }

    pub fn fill_auth(&mut self, keychain: Option<&PassKeyChain>) { self.config.backend_config.fill_auth(keychain) }

    pub fn storage_backend(&self) -> (BackendType, &BackendConfig) {
        (self.config.backend_type, &self.config.backend_config)
    }

    pub fn update_mirrors(&mut self, mirrors_dir: &MirrorsDir, registry_host: &str) -> Result<()> {
        self.config.backend_config.update_mirrors(mirrors_dir, registry_host)
    }
}

impl Redact for FscacheDaemonConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::literal("type", &self.blob_type),
            Field::literal("id", &self.id),
            Field::literal("domain_id", &self.domain_id),
            Field::nested_plain("config", &self.config),
            Field::optional("fs_prefetch", self.fs_prefetch.as_ref()),
        ]
    }
}
