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

//! Fixtures shared by the integration tests.

use std::path::{Path, PathBuf};

use lazycfg_common::MIRRORS_HOSTS_FILE;
use serde_json::json;

/// A fusedev template with a registry backend carrying static credentials.
pub fn fuse_registry_template() -> serde_json::Value {
    json!({
        "device": {
            "backend": {
                "type": "registry",
                "config": {
                    "scheme": "https",
                    "auth": "c3RhdGljOnRlbXBsYXRl",
                    "timeout": 5,
                    "connect_timeout": 5,
                    "retry_limit": 2,
                    "mirrors": [{"host": "http://template-mirror"}]
                }
            },
            "cache": {"type": "blobcache", "config": {"work_dir": "/var/lib/lazycfg/cache"}}
        },
        "mode": "direct",
        "digest_validate": false,
        "iostats_files": false,
        "enable_xattr": true,
        "fs_prefetch": {"enable": true, "threads_count": 8, "merging_size": 1048576}
    })
}

/// An fscache template with a registry backend.
pub fn fscache_registry_template() -> serde_json::Value {
    json!({
        "type": "bootstrap",
        "config": {
            "backend_type": "registry",
            "backend_config": {"scheme": "https", "registry_token": "static-token"},
            "cache_type": "fscache"
        }
    })
}

pub fn write_template(dir: &Path, name: &str, template: &serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, template.to_string()).unwrap();
    path
}

/// Configure `mirrors` for `host`, in order.
pub fn write_hosts(mirrors_dir: &Path, host: &str, mirrors: &[&str]) {
    let dir = mirrors_dir.join(host);
    std::fs::create_dir_all(&dir).unwrap();
    let content: String = mirrors
        .iter()
        .map(|m| format!("[host.\"{m}\"]\n  failure_limit = 5\n\n"))
        .collect();
    std::fs::write(dir.join(MIRRORS_HOSTS_FILE), content).unwrap();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lazycfg_common::{LABEL_PULL_SECRET, LABEL_PULL_USERNAME, PARAM_CACHE_DIR};
    use lazycfg_daemon::{
        auth::PassKeyChain,
        mirrors::MirrorsDir,
        new_daemon_config,
        redact::{dump_redacted_string, redact},
        supplement::{SnapshotRequest, Supplementer},
        BackendType,
    };

    use super::*;

    #[test]
    fn busybox_end_to_end() {
        lazycfg_utils::logger::install_fmt_log();

        let dir = tempfile::tempdir().unwrap();
        let mirrors = dir.path().join("certs.d");
        write_hosts(&mirrors, "index.docker.io", &["http://m2", "http://m0", "http://m1"]);
        let template = write_template(dir.path(), "fusedev.json", &fuse_registry_template());

        let supplementer = Supplementer::new(MirrorsDir::new(&mirrors));
        let mut config = new_daemon_config("fusedev", &template).unwrap();
        let req = SnapshotRequest::new("docker.io/library/busybox:latest", "3")
            .with_label(LABEL_PULL_USERNAME, "hubuser")
            .with_label(LABEL_PULL_SECRET, "hubpass");
        supplementer.supplement_daemon_config(&mut config, &req).unwrap();

        let (kind, backend) = config.storage_backend();
        assert_eq!(kind, BackendType::Registry);
        assert_eq!(backend.host, "index.docker.io");
        assert_eq!(backend.repo, "library/busybox");
        let hosts: Vec<_> = backend.mirrors.iter().map(|m| m.host.as_str()).collect();
        assert_eq!(hosts, vec!["http://m2", "http://m0", "http://m1"]);
        assert_eq!(backend.auth, PassKeyChain::new("hubuser", "hubpass").to_base64());

        let full = config.dump_string().unwrap();
        assert!(full.contains(&backend.auth));
        let redacted = dump_redacted_string(&config).unwrap();
        assert!(!redacted.contains(&backend.auth));
        assert!(!redacted.contains("\"auth\""));
        assert!(redacted.contains("index.docker.io"));
        assert!(!redacted.contains("null"));
    }

    #[test]
    fn fscache_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), "fscache.json", &fscache_registry_template());

        let supplementer = Supplementer::new(MirrorsDir::disabled());
        let mut config = new_daemon_config("fscache", &template).unwrap();
        let req = SnapshotRequest::new("ghcr.io/org/app:v1", "42").with_param(PARAM_CACHE_DIR, "/cache/42");
        supplementer.supplement_daemon_config(&mut config, &req).unwrap();

        let map = redact(&config).unwrap();
        assert_eq!(map["id"], "42");
        assert_eq!(map["config"]["cache_config"]["work_dir"], "/cache/42");
        assert_eq!(map["config"]["backend_config"]["host"], "ghcr.io");
        assert!(map["config"]["backend_config"].get("registry_token").is_none());

        let full: serde_json::Value = serde_json::from_str(&config.dump_string().unwrap()).unwrap();
        assert_eq!(full["config"]["backend_config"]["registry_token"], "static-token");
    }

    #[test]
    fn concurrent_supplements_stay_isolated() {
        const N: usize = 16;

        let dir = tempfile::tempdir().unwrap();
        let mirrors = dir.path().join("certs.d");
        for i in 0..N {
            write_hosts(
                &mirrors,
                &format!("registry{i}.example.com"),
                &[&format!("http://mirror{i}-a"), &format!("http://mirror{i}-b")],
            );
        }
        let supplementer = Arc::new(Supplementer::new(MirrorsDir::new(&mirrors)));
        let template = write_template(dir.path(), "fusedev.json", &fuse_registry_template());

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..N)
                .map(|i| {
                    let supplementer = Arc::clone(&supplementer);
                    let template = &template;
                    s.spawn(move || {
                        let mut config = new_daemon_config("fusedev", template).unwrap();
                        let req = SnapshotRequest::new(
                            format!("registry{i}.example.com/team{i}/app:v{i}"),
                            i.to_string(),
                        );
                        supplementer.supplement_daemon_config(&mut config, &req).unwrap();
                        (i, config)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.len(), N);
        for (i, config) in results {
            let (_, backend) = config.storage_backend();
            assert_eq!(backend.host, format!("registry{i}.example.com"));
            assert_eq!(backend.repo, format!("team{i}/app"));
            let hosts: Vec<_> = backend.mirrors.iter().map(|m| m.host.clone()).collect();
            assert_eq!(hosts, vec![format!("http://mirror{i}-a"), format!("http://mirror{i}-b")]);
        }
    }

    #[test]
    fn unknown_backend_rejected_at_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut template = fuse_registry_template();
        template["device"]["backend"]["type"] = "webdav".into();
        let path = write_template(dir.path(), "fusedev.json", &template);

        let err = new_daemon_config("fusedev", &path).unwrap_err();
        assert!(err.is_unsupported_backend());
        assert!(err.to_string().contains("webdav"));
    }
}
