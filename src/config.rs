// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;

use serde::Deserialize;

use crate::error::Fallible;
use crate::types::selection::Severity;

pub const CONFIG_FILE_NAME: &str = "vocadrill.toml";

/// Minimum seconds between debounced sync flushes.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// The learner's nickname. The opaque user key is derived from it; when
    /// absent the engine runs in pure local mode.
    pub nickname: Option<String>,
    /// Base URL of the remote progress store.
    pub remote_url: Option<String>,
    /// Default severity for the daily selection.
    pub severity: Option<Severity>,
    pub sync_interval_secs: Option<u64>,
}

impl Config {
    pub fn severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::Light)
    }

    pub fn sync_interval_secs(&self) -> u64 {
        self.sync_interval_secs
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS)
            .max(DEFAULT_SYNC_INTERVAL_SECS)
    }
}

/// Load the config file from the collection directory. A missing file means
/// defaults; a malformed file is an error, since it is learner-written
/// configuration rather than cached state.
pub fn load_config(directory: &Path) -> Fallible<Config> {
    let path = directory.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}
