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

use snafu::{whatever, Whatever};

/// Reads an environment variable for the current process.
///
/// Unlike [std::env::var], the `.env` file of the current or parent
/// directories is loaded through [dotenvy] first, and an unset variable is
/// `Ok(None)` rather than an error.
#[track_caller]
pub fn var(key: &str) -> Result<Option<String>, Whatever> {
    match dotenvy::var(key) {
        Ok(content) => Ok(Some(content)),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(None),
        Err(error) => whatever!(Err(error), "Failed to read {key} environment variable"),
    }
}

/// Reads an environment variable holding a filesystem path.
///
/// A variable that is set but empty is treated as unset.
#[track_caller]
pub fn var_path(key: &str) -> Result<Option<PathBuf>, Whatever> {
    Ok(var(key)?
        .filter(|content| !content.trim().is_empty())
        .map(PathBuf::from))
}
