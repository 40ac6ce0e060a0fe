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

pub const LAZYCFG: &str = "lazycfg";

// Filesystem drivers of the daemon.
pub const FS_DRIVER_FUSEDEV: &str = "fusedev";
pub const FS_DRIVER_FSCACHE: &str = "fscache";

// Storage backend type tags found in templates.
pub const BACKEND_TYPE_LOCALFS: &str = "localfs";
pub const BACKEND_TYPE_OSS: &str = "oss";
pub const BACKEND_TYPE_REGISTRY: &str = "registry";

/// The user facing domain of the public default registry.
pub const DOCKER_HUB_DOMAIN: &str = "docker.io";
/// The host which actually serves the public default registry API.
pub const DOCKER_HUB_API_HOST: &str = "index.docker.io";
/// The key docker used to store docker hub credentials in `config.json`.
pub const DOCKER_HUB_LEGACY_AUTH_KEY: &str = "https://index.docker.io/v1/";
pub const DOCKER_HUB_OFFICIAL_REPO_PREFIX: &str = "library";

pub const VPC_HOST_SUFFIX: &str = "-vpc";

// Request parameters understood by `Supplement`.
pub const PARAM_CACHE_DIR: &str = "cache_dir";
pub const PARAM_BOOTSTRAP: &str = "bootstrap";
pub const PARAM_DOMAIN_ID: &str = "domain_id";

// Snapshot labels carrying pull credentials.
pub const LABEL_PULL_USERNAME: &str = "containerd.io/snapshot/pullusername";
pub const LABEL_PULL_SECRET: &str = "containerd.io/snapshot/pullsecret";

// Layout of the mirrors config directory.
pub const MIRRORS_HOSTS_FILE: &str = "hosts.toml";
pub const MIRRORS_DEFAULT_DIR: &str = "_default";

// Environment variables.
pub const ENV_LOG: &str = "LAZYCFG_LOG";
pub const ENV_MIRRORS_CONFIG_DIR: &str = "LAZYCFG_MIRRORS_CONFIG_DIR";
pub const ENV_DOCKER_CONFIG: &str = "DOCKER_CONFIG";

pub const DOCKER_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_LOG_DIR: &str = "/tmp/lazycfg";
