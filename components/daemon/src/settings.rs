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

use std::path::{Path, PathBuf};

use lazycfg_common::{DOCKER_CONFIG_FILE, ENV_DOCKER_CONFIG, ENV_MIRRORS_CONFIG_DIR};
use lazycfg_utils::{env, logger::LoggingOptions};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Whatever};

use crate::err::{Result, SettingsDecodeSnafu, SettingsEnvSnafu, SettingsLoadSnafu};

/// Settings of the tool itself, as opposed to the daemon configuration it
/// produces.
///
/// ```toml
/// mirrors_config_dir = "/etc/lazycfg/certs.d"
/// docker_config_path = "/root/.docker/config.json"
///
/// [logging]
/// dir = "/var/log/lazycfg"
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub mirrors_config_dir: Option<PathBuf>,
    pub docker_config_path: Option<PathBuf>,
    pub logging:            LoggingOptions,
}

impl Settings {
    /// Read the optional settings file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(SettingsLoadSnafu { path })?;
        toml::from_str(&content).context(SettingsDecodeSnafu { path })
    }

    /// `LAZYCFG_MIRRORS_CONFIG_DIR` wins over the file. The docker config
    /// falls back to `$DOCKER_CONFIG/config.json`, then
    /// `$HOME/.docker/config.json`.
    pub fn apply_env(&mut self) -> Result<()> { self.apply_env_with(env::var_path) }

    /// [Settings::apply_env] with path variables read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> std::result::Result<Option<PathBuf>, Whatever>,
    {
        if let Some(dir) = lookup(ENV_MIRRORS_CONFIG_DIR).context(SettingsEnvSnafu)? {
            self.mirrors_config_dir = Some(dir);
        }
        if self.docker_config_path.is_none() {
            self.docker_config_path = if let Some(dir) = lookup(ENV_DOCKER_CONFIG).context(SettingsEnvSnafu)? {
                Some(dir.join(DOCKER_CONFIG_FILE))
            } else {
                lookup("HOME")
                    .context(SettingsEnvSnafu)?
                    .map(|home| home.join(".docker").join(DOCKER_CONFIG_FILE))
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazycfg.toml");
        std::fs::write(
            &path,
            r#"
mirrors_config_dir = "/etc/lazycfg/certs.d"
docker_config_path = "/root/.docker/config.json"

[logging]
level = "debug"
append_stdout = false
"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.mirrors_config_dir, Some(PathBuf::from("/etc/lazycfg/certs.d")));
        assert_eq!(settings.docker_config_path, Some(PathBuf::from("/root/.docker/config.json")));
        assert_eq!(settings.logging.level.as_deref(), Some("debug"));
        assert!(!settings.logging.append_stdout);
        assert_eq!(settings.logging.dir, LoggingOptions::default().dir);

        std::fs::write(&path, "mirrors_config_dir = 3").unwrap();
        assert!(Settings::from_file(&path).is_err());
        assert!(Settings::from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn env_overrides() {
        let vars = HashMap::from([
            (ENV_MIRRORS_CONFIG_DIR, "/run/lazycfg/mirrors"),
            (ENV_DOCKER_CONFIG, "/run/lazycfg/docker"),
            ("HOME", "/home/builder"),
        ]);
        let lookup = |vars: &HashMap<&str, &str>, key: &str| vars.get(key).map(PathBuf::from);

        let mut settings = Settings {
            mirrors_config_dir: Some(PathBuf::from("/from/file")),
            ..Default::default()
        };
        settings.apply_env_with(|key| Ok(lookup(&vars, key))).unwrap();
        assert_eq!(settings.mirrors_config_dir, Some(PathBuf::from("/run/lazycfg/mirrors")));
        assert_eq!(
            settings.docker_config_path,
            Some(PathBuf::from("/run/lazycfg/docker/config.json"))
        );

        // an explicit docker config path is kept
        let mut settings = Settings {
            docker_config_path: Some(PathBuf::from("/explicit.json")),
            ..Default::default()
        };
        settings.apply_env_with(|key| Ok(lookup(&vars, key))).unwrap();
        assert_eq!(settings.docker_config_path, Some(PathBuf::from("/explicit.json")));

        let home_only = HashMap::from([("HOME", "/home/builder")]);
        let mut settings = Settings {
            mirrors_config_dir: Some(PathBuf::from("/from/file")),
            ..Default::default()
        };
        settings.apply_env_with(|key| Ok(lookup(&home_only, key))).unwrap();
        assert_eq!(settings.mirrors_config_dir, Some(PathBuf::from("/from/file")));
        assert_eq!(
            settings.docker_config_path,
            Some(PathBuf::from("/home/builder/.docker/config.json"))
        );

        let mut settings = Settings::default();
        settings.apply_env_with(|_| Ok(None)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn env_lookup_failure() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env_with(|key| snafu::whatever!("{} is not unicode", key))
            .unwrap_err();
        assert!(matches!(err, crate::Error::SettingsEnv { .. }));
    }
}
