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

use std::{collections::BTreeMap, fmt, str::FromStr};

use lazycfg_common::{BACKEND_TYPE_LOCALFS, BACKEND_TYPE_OSS, BACKEND_TYPE_REGISTRY};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    auth::PassKeyChain,
    err::{Error, Result, UnsupportedBackendSnafu},
    mirrors::MirrorsDir,
    redact::{Field, Redact},
};

pub(crate) fn is_zero<T: Default + PartialEq>(v: &T) -> bool { *v == T::default() }

/// Where the daemon reads image content from. Picked by the explicit type
/// tag of a template, never by which [BackendConfig] fields are populated.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Localfs,
    Oss,
    Registry,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Localfs => BACKEND_TYPE_LOCALFS,
            Self::Oss => BACKEND_TYPE_OSS,
            Self::Registry => BACKEND_TYPE_REGISTRY,
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            BACKEND_TYPE_LOCALFS => Ok(Self::Localfs),
            BACKEND_TYPE_OSS => Ok(Self::Oss),
            BACKEND_TYPE_REGISTRY => Ok(Self::Registry),
            other => UnsupportedBackendSnafu { kind: other }.fail(),
        }
    }
}

/// An alternative endpoint serving the same registry content. The position
/// in [BackendConfig::mirrors] is its fallback priority.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct MirrorConfig {
    #[serde(skip_serializing_if = "is_zero")]
    pub host:                  String,
    #[serde(skip_serializing_if = "is_zero")]
    pub headers:               BTreeMap<String, String>,
    /// Seconds between two health checks of an unhealthy mirror.
    #[serde(skip_serializing_if = "is_zero")]
    pub health_check_interval: u64,
    /// Failures tolerated before the mirror is marked unhealthy.
    #[serde(skip_serializing_if = "is_zero")]
    pub failure_limit:         u8,
    #[serde(skip_serializing_if = "is_zero")]
    pub ping_url:              String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "is_zero")]
    pub url:            String,
    pub fallback:       bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub ping_url:       String,
    #[serde(skip_serializing_if = "is_zero")]
    pub check_interval: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub use_http:       bool,
}

impl Redact for ProxyConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::literal("url", &self.url).omit_if_zero(),
            Field::literal("fallback", &self.fallback),
            Field::literal("ping_url", &self.ping_url).omit_if_zero(),
            Field::literal("check_interval", &self.check_interval).omit_if_zero(),
            Field::literal("use_http", &self.use_http).omit_if_zero(),
        ]
    }
}

/// Settings of every supported backend. Only the group matching the
/// [BackendType] tag is meaningful for a given template.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    // ========Localfs ===>
    #[serde(skip_serializing_if = "is_zero")]
    pub blob_file:     String,
    #[serde(skip_serializing_if = "is_zero")]
    pub dir:           String,
    pub readahead:     bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub readahead_sec: u64,

    // ========Registry ===>
    #[serde(skip_serializing_if = "is_zero")]
    pub host:                 String,
    #[serde(skip_serializing_if = "is_zero")]
    pub repo:                 String,
    /// base64 of `username:password`.
    #[serde(skip_serializing_if = "is_zero")]
    pub auth:                 String,
    #[serde(skip_serializing_if = "is_zero")]
    pub registry_token:       String,
    #[serde(skip_serializing_if = "is_zero")]
    pub blob_url_scheme:      String,
    #[serde(skip_serializing_if = "is_zero")]
    pub blob_redirected_host: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub mirrors:              Vec<MirrorConfig>,

    // ========OSS ===>
    #[serde(skip_serializing_if = "is_zero")]
    pub endpoint:          String,
    #[serde(skip_serializing_if = "is_zero")]
    pub access_key_id:     String,
    #[serde(skip_serializing_if = "is_zero")]
    pub access_key_secret: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub bucket_name:       String,
    #[serde(skip_serializing_if = "is_zero")]
    pub object_prefix:     String,

    // ========Registry and OSS ===>
    #[serde(skip_serializing_if = "is_zero")]
    pub scheme:      String,
    #[serde(skip_serializing_if = "is_zero")]
    pub skip_verify: bool,

    // ========Shared ===>
    #[serde(skip_serializing_if = "is_zero")]
    pub proxy:           ProxyConfig,
    /// Seconds.
    #[serde(skip_serializing_if = "is_zero")]
    pub timeout:         u64,
    /// Seconds.
    #[serde(skip_serializing_if = "is_zero")]
    pub connect_timeout: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub retry_limit:     u32,
}

impl BackendConfig {
    /// Copy the credentials of `keychain` into the backend. Nothing happens
    /// for an absent or empty keychain, which keeps the static credentials
    /// of a template when discovery finds none.
    pub fn fill_auth(&mut self, keychain: Option<&PassKeyChain>) {
        let Some(kc) = keychain.filter(|kc| !kc.is_empty()) else {
            debug!(host = %self.host, "no keychain found, keep auth from template");
            return;
        };
        if kc.token_base() {
            self.registry_token = kc.password.clone();
        } else {
            self.auth = kc.to_base64();
        }
    }

    /// Replace the mirror list with the one configured for `registry_host`.
    ///
    /// The list is loaded completely before anything is assigned, so a
    /// failure leaves the current mirrors untouched. An empty result keeps
    /// the mirrors of the template.
    pub fn update_mirrors(&mut self, mirrors_dir: &MirrorsDir, registry_host: &str) -> Result<()> {
        let mirrors = mirrors_dir.load(registry_host)?;
        if mirrors.is_empty() {
            debug!(registry_host, "no mirrors configured, keep mirrors from template");
            return Ok(());
        }
        info!(registry_host, count = mirrors.len(), "replace registry mirrors");
        self.mirrors = mirrors;
        Ok(())
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("blob_file", &self.blob_file)
            .field("dir", &self.dir)
            .field("host", &self.host)
            .field("repo", &self.repo)
            .field("mirrors", &self.mirrors)
            .field("endpoint", &self.endpoint)
            .field("bucket_name", &self.bucket_name)
            .field("object_prefix", &self.object_prefix)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl Redact for BackendConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::literal("blob_file", &self.blob_file).omit_if_zero(),
            Field::literal("dir", &self.dir).omit_if_zero(),
            Field::literal("readahead", &self.readahead),
            Field::literal("readahead_sec", &self.readahead_sec).omit_if_zero(),
            Field::literal("host", &self.host).omit_if_zero(),
            Field::literal("repo", &self.repo).omit_if_zero(),
            Field::literal("auth", &self.auth).omit_if_zero().secret(),
            Field::literal("registry_token", &self.registry_token).omit_if_zero().secret(),
            Field::literal("blob_url_scheme", &self.blob_url_scheme).omit_if_zero(),
            Field::literal("blob_redirected_host", &self.blob_redirected_host).omit_if_zero(),
            Field::literal("mirrors", &self.mirrors).omit_if_zero(),
            Field::literal("endpoint", &self.endpoint).omit_if_zero(),
            Field::literal("access_key_id", &self.access_key_id).omit_if_zero().secret(),
            Field::literal("access_key_secret", &self.access_key_secret).omit_if_zero().secret(),
            Field::literal("bucket_name", &self.bucket_name).omit_if_zero(),
            Field::literal("object_prefix", &self.object_prefix).omit_if_zero(),
            Field::literal("scheme", &self.scheme).omit_if_zero(),
            Field::literal("skip_verify", &self.skip_verify).omit_if_zero(),
            Field::nested("proxy", &self.proxy).omit_if_zero(),
            Field::literal("timeout", &self.timeout).omit_if_zero(),
            Field::literal("connect_timeout", &self.connect_timeout).omit_if_zero(),
            Field::literal("retry_limit", &self.retry_limit).omit_if_zero(),
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BackendSection {
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    #[serde(default)]
    pub config:       BackendConfig,
}

impl Redact for BackendSection {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::plain("type", &self.backend_type),
            Field::nested("config", &self.config),
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub work_dir:            String,
    pub disable_indexed_map: bool,
}

impl Redact for CacheConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::literal("work_dir", &self.work_dir),
            Field::literal("disable_indexed_map", &self.disable_indexed_map),
        ]
    }
}

/// The local cache policy of a device.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSection {
    #[serde(rename = "type")]
    pub cache_type: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub compressed: bool,
    pub config:     CacheConfig,
}

impl Redact for CacheSection {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::literal("type", &self.cache_type),
            Field::literal("compressed", &self.compressed).omit_if_zero(),
            Field::nested("config", &self.config),
        ]
    }
}

/// A storage backend paired with its cache policy.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub backend: BackendSection,
    #[serde(default)]
    pub cache:   CacheSection,
}

impl Redact for DeviceConfig {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::nested_plain("backend", &self.backend),
            Field::nested("cache", &self.cache),
        ]
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;

    use super::*;
    use crate::redact::{dump_redacted_string, redact};

    #[test]
    fn backend_type_from_str() {
        assert_eq!("registry".parse::<BackendType>().unwrap(), BackendType::Registry);
        assert_eq!("localfs".parse::<BackendType>().unwrap(), BackendType::Localfs);
        assert_eq!("oss".parse::<BackendType>().unwrap(), BackendType::Oss);
        let err = "s3".parse::<BackendType>().unwrap_err();
        assert!(err.is_unsupported_backend());
        assert!(err.to_string().contains("s3"));
    }

    #[test]
    fn redact_auth_keep_host() {
        let cfg = BackendConfig {
            auth: "token-abc".to_string(),
            host: "example.com".to_string(),
            ..Default::default()
        };
        let map = redact(&cfg).unwrap();
        assert_eq!(map.get("host"), Some(&json!("example.com")));
        assert!(!map.contains_key("auth"));
    }

    #[test]
    fn redact_drops_every_credential() {
        let cfg = BackendConfig {
            host: "registry.example.com".to_string(),
            auth: "YWxpY2U6c2VjcmV0".to_string(),
            registry_token: "bearer-xyz".to_string(),
            access_key_id: "AKID".to_string(),
            access_key_secret: "AKSECRET".to_string(),
            mirrors: vec![MirrorConfig {
                host: "https://mirror.example.com".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let map = redact(&cfg).unwrap();
        for key in ["auth", "registry_token", "access_key_id", "access_key_secret"] {
            assert!(!map.contains_key(key), "{key} leaked");
        }
        // zero fields with the omit policy are gone, readahead is always kept
        assert!(!map.contains_key("proxy"));
        assert!(!map.contains_key("timeout"));
        assert_eq!(map.get("readahead"), Some(&json!(false)));
        assert_eq!(
            map.get("mirrors"),
            Some(&json!([{"host": "https://mirror.example.com"}]))
        );

        let dumped = dump_redacted_string(&cfg).unwrap();
        assert!(!dumped.contains("bearer-xyz"));
        assert!(!dumped.contains("AKSECRET"));
    }

    #[test]
    fn redact_nested_device() {
        let device = DeviceConfig {
            backend: BackendSection {
                backend_type: BackendType::Registry,
                config:       BackendConfig {
                    host: "example.com".to_string(),
                    auth: "secret".to_string(),
                    proxy: ProxyConfig {
                        url: "http://p2p-proxy:65001".to_string(),
                        fallback: true,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            },
            cache:   CacheSection {
                cache_type: "blobcache".to_string(),
                compressed: false,
                config:     CacheConfig {
                    work_dir:            "/var/lib/cache".to_string(),
                    disable_indexed_map: false,
                },
            },
        };
        let map = redact(&device).unwrap();
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            json!({
                "backend": {
                    "type": "registry",
                    "config": {
                        "host": "example.com",
                        "readahead": false,
                        "proxy": {"url": "http://p2p-proxy:65001", "fallback": true},
                    },
                },
                "cache": {
                    "type": "blobcache",
                    "config": {"work_dir": "/var/lib/cache", "disable_indexed_map": false},
                },
            })
        );
    }

    #[test]
    fn fill_auth_never_clears() {
        let mut cfg = BackendConfig {
            auth: "c3RhdGljOmNyZWQ=".to_string(),
            ..Default::default()
        };
        cfg.fill_auth(None);
        cfg.fill_auth(Some(&PassKeyChain::default()));
        assert_eq!(cfg.auth, "c3RhdGljOmNyZWQ=");

        cfg.fill_auth(Some(&PassKeyChain::new("alice", "secret")));
        assert_eq!(cfg.auth, STANDARD.encode("alice:secret"));
        assert!(cfg.registry_token.is_empty());

        cfg.fill_auth(Some(&PassKeyChain::new("", "bearer-xyz")));
        assert_eq!(cfg.registry_token, "bearer-xyz");
        assert_eq!(cfg.auth, STANDARD.encode("alice:secret"));
    }

    #[test]
    fn update_mirrors_keeps_template_mirrors() {
        let template = vec![
            MirrorConfig {
                host: "http://t1".to_string(),
                failure_limit: 3,
                ..Default::default()
            },
            MirrorConfig {
                host: "http://t0".to_string(),
                ..Default::default()
            },
        ];
        let mut cfg = BackendConfig {
            mirrors: template.clone(),
            ..Default::default()
        };
        let before = serde_json::to_string(&cfg).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let host_dir = dir.path().join("ghcr.io");
        std::fs::create_dir_all(&host_dir).unwrap();
        std::fs::write(host_dir.join(lazycfg_common::MIRRORS_HOSTS_FILE), "[host.\"http://m\"\n").unwrap();
        let mirrors_dir = MirrorsDir::new(dir.path());

        // malformed hosts.toml
        let err = cfg.update_mirrors(&mirrors_dir, "ghcr.io").unwrap_err();
        assert!(matches!(err, crate::Error::MirrorsDecode { .. }));
        assert_eq!(cfg.mirrors, template);
        assert_eq!(serde_json::to_string(&cfg).unwrap(), before);

        // no hosts.toml for the host and no _default
        cfg.update_mirrors(&mirrors_dir, "quay.io").unwrap();
        assert_eq!(cfg.mirrors, template);
        assert_eq!(serde_json::to_string(&cfg).unwrap(), before);

        cfg.update_mirrors(&MirrorsDir::disabled(), "quay.io").unwrap();
        assert_eq!(cfg.mirrors, template);

        std::fs::write(
            host_dir.join(lazycfg_common::MIRRORS_HOSTS_FILE),
            "[host.\"http://m1\"]\n[host.\"http://m0\"]\n",
        )
        .unwrap();
        cfg.update_mirrors(&mirrors_dir, "ghcr.io").unwrap();
        let hosts: Vec<_> = cfg.mirrors.iter().map(|m| m.host.as_str()).collect();
        assert_eq!(hosts, vec!["http://m1", "http://m0"]);
    }

    #[test]
    fn json_layout_of_backend() {
        let cfg: BackendConfig = serde_json::from_value(json!({
            "host": "example.com",
            "mirrors": [{"host": "https://m1"}, {"host": "https://m0"}],
        }))
        .unwrap();
        assert_eq!(cfg.mirrors[0].host, "https://m1");
        assert_eq!(cfg.mirrors[1].host, "https://m0");
        assert_eq!(
            serde_json::to_value(&cfg).unwrap(),
            json!({
                "host": "example.com",
                "readahead": false,
                "mirrors": [{"host": "https://m1"}, {"host": "https://m0"}],
            })
        );
    }

    #[test]
    fn debug_hides_credentials() {
        let cfg = BackendConfig {
            auth: "c2VjcmV0".to_string(),
            access_key_secret: "AKSECRET".to_string(),
            ..Default::default()
        };
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("c2VjcmV0"));
        assert!(!printed.contains("AKSECRET"));
    }
}
