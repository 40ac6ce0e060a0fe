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

use serde::{Deserialize, Serialize};

use crate::{
    auth::PassKeyChain,
    backend::{is_zero, BackendConfig, BackendType, DeviceConfig},
    err::Result,
    mirrors::MirrorsDir,
    redact::{Field, Redact},
};

/// Prefetch policy of the whole filesystem.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FsPrefetch {
    pub enable:         bool,
    pub prefetch_all:   bool,
    pub threads_count:  usize,
    /// Adjacent requests are merged up to this many bytes.
    pub merging_size:   usize,
    /// Bytes per second, 0 means unlimited.
    pub bandwidth_rate: u64,
}

impl Redact for FsPrefetch {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::literal("enable", &self.enable),
            Field::literal("prefetch_all", &self.prefetch_all),
            Field::literal("threads_count", &self.threads_count),
            Field::literal("merging_size", &self.merging_size),
            Field::literal("bandwidth_rate", &self.bandwidth_rate),
        ]
    }
}

/// Configuration of a daemon serving through FUSE.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FuseDaemonConfig {
    pub device:            DeviceConfig,
    /// `direct` or `cached`.
    #[serde(default)]
    pub mode:              String,
    #[serde(default)]
    pub digest_validate:   bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub iostats_files:     bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub enable_xattr:      bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub access_pattern:    bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub latest_read_files: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub amplify_io:        u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_prefetch:       Option<FsPrefetch>,
}

impl FuseDaemonConfig {
    pub fn supplement(&mut self, host: &str, repo: &str, _snapshot_id: &str, _params: &HashMap<String, String>) {
        let backend = &mut self.device.backend.config;
        backend.host = host.to_string();
        backend.repo = repo.to_string();
    }

    pub fn fill_auth(&mut self, keychain: Option<&PassKeyChain>) { self.device.backend.config.fill_auth(keychain) }

    pub fn storage_backend(&self) -> (BackendType, &BackendConfig) {
        (self.device.backend.backend_type, &self.device.backend.config)
    }

    pub fn update_mirrors(&mut self, mirrors_dir: &MirrorsDir, registry_host: &str) -> Result<()> {
        self.device.backend.config.update_mirrors(mirrors_dir, registry_host)
    }
}

impl Redact for FuseDaemonConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::nested_plain("device", &self.device),
            Field::literal("mode", &self.mode),
            Field::literal("digest_validate", &self.digest_validate),
            Field::literal("iostats_files", &self.iostats_files).omit_if_zero(),
            Field::literal("enable_xattr", &self.enable_xattr).omit_if_zero(),
            Field::literal("access_pattern", &self.access_pattern).omit_if_zero(),
            Field::literal("latest_read_files", &self.latest_read_files).omit_if_zero(),
            Field::literal("amplify_io", &self.amplify_io).omit_if_zero(),
            Field::optional("fs_prefetch", self.fs_prefetch.as_ref()),
        ]
    }
}
