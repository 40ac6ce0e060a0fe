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
    fmt,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use lazycfg_common::{
    DOCKER_HUB_API_HOST, DOCKER_HUB_DOMAIN, DOCKER_HUB_LEGACY_AUTH_KEY, LABEL_PULL_SECRET,
    LABEL_PULL_USERNAME,
};
use serde::Deserialize;
use tracing::{debug, warn};

/// Resolved registry credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PassKeyChain {
    pub username: String,
    pub password: String,
}

impl PassKeyChain {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode the `auth` form of docker, base64 of `username:password`.
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }

    pub fn is_empty(&self) -> bool { self.username.is_empty() && self.password.is_empty() }

    /// A bare password without username is a registry token.
    pub fn token_base(&self) -> bool { self.username.is_empty() && !self.password.is_empty() }

    pub fn to_base64(&self) -> String { STANDARD.encode(format!("{}:{}", self.username, self.password)) }
}

impl fmt::Debug for PassKeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassKeyChain")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Looks up credentials for an image. Lookups never fail: a provider which
/// can't find or read credentials answers `None`.
pub trait KeychainProvider: Send + Sync {
    fn keychain(
        &self,
        host: &str,
        image_id: &str,
        labels: &HashMap<String, String>,
    ) -> Option<PassKeyChain>;
}

/// Credentials passed along with the snapshot labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelKeychain;

impl KeychainProvider for LabelKeychain {
    fn keychain(
        &self,
        _host: &str,
        _image_id: &str,
        labels: &HashMap<String, String>,
    ) -> Option<PassKeyChain> {
        let username = labels.get(LABEL_PULL_USERNAME)?;
        let secret = labels.get(LABEL_PULL_SECRET)?;
        Some(PassKeyChain::new(username.as_str(), secret.as_str())).filter(|kc| !kc.is_empty())
    }
}

/// Credentials from a docker `config.json`. The file is read on every
/// lookup so that `docker login` is picked up without restart.
#[derive(Debug, Clone)]
pub struct DockerConfigKeychain {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DockerConfigFile {
    auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DockerAuthEntry {
    auth:     String,
    username: String,
    password: String,
}

impl DockerAuthEntry {
    fn keychain(&self) -> Option<PassKeyChain> {
        if !self.auth.is_empty() {
            return PassKeyChain::from_base64(&self.auth);
        }
        Some(PassKeyChain::new(self.username.as_str(), self.password.as_str())).filter(|kc| !kc.is_empty())
    }
}

impl DockerConfigKeychain {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    fn load(&self) -> Option<DockerConfigFile> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read docker config: {e}");
                return None;
            }
        };
        match serde_json::from_slice(&content) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %self.path.display(), "malformed docker config: {e}");
                None
            }
        }
    }
}

fn auth_keys(host: &str) -> Vec<String> {
    let mut keys = vec![
        host.to_string(),
        format!("https://{host}"),
        format!("http://{host}"),
    ];
    if host == DOCKER_HUB_API_HOST || host == DOCKER_HUB_DOMAIN {
        keys.push(DOCKER_HUB_LEGACY_AUTH_KEY.to_string());
    }
    keys
}

impl KeychainProvider for DockerConfigKeychain {
    fn keychain(
        &self,
        host: &str,
        _image_id: &str,
        _labels: &HashMap<String, String>,
    ) -> Option<PassKeyChain> {
        let file = self.load()?;
        auth_keys(host)
            .iter()
            .filter_map(|key| file.auths.get(key))
            .find_map(DockerAuthEntry::keychain)
    }
}

/// Asks each provider in turn, the first non-empty keychain wins.
#[derive(Default)]
pub struct KeychainChain {
    providers: Vec<Box<dyn KeychainProvider>>,
}

impl KeychainChain {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, provider: impl KeychainProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl KeychainProvider for KeychainChain {
    fn keychain(
        &self,
        host: &str,
        image_id: &str,
        labels: &HashMap<String, String>,
    ) -> Option<PassKeyChain> {
        let found = self
            .providers
            .iter()
            .find_map(|p| p.keychain(host, image_id, labels).filter(|kc| !kc.is_empty()));
        if found.is_none() {
            debug!(host, image_id, "no credentials found");
        }
        found
    }
}
