// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration lives in `<data_dir>/config.toml`; a missing file means all
//! defaults. The data directory comes from `--data-dir`, then the
//! `CHATSYNC_DIR` environment variable, then the platform data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chatsync_core::{RetryPolicy, StoreOptions};

use crate::error::{Error, Result};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CHATSYNC_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";
const SQLITE_FILE_NAME: &str = "chatsync.db";
const FILE_STORE_DIR_NAME: &str = "store";

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Signed-in identity; anonymous state is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Backend holding the local store's collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Remote server settings. Without a URL the client runs local-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL (`ws://...` or `wss://...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Max time to wait for the reply to one request, in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Scheduler and retry tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Period of the background sync pass in seconds (default: 30).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Batching delay between a mutation and its sync pass (default: 500).
    #[serde(default = "default_mutation_delay_ms")]
    pub mutation_delay_ms: u64,
    /// Quiet period before local changes are persisted (default: 1000).
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,
    /// Delay after the first failed attempt (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the retry delay in seconds (default: 60).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Failed attempts before a record is marked permanently failed (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    30
}

fn default_mutation_delay_ms() -> u64 {
    500
}

fn default_persist_debounce_ms() -> u64 {
    1000
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    5
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_secs: default_interval_secs(),
            mutation_delay_ms: default_mutation_delay_ms(),
            persist_debounce_ms: default_persist_debounce_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn mutation_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_delay_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            max_retries: self.max_retries,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            retry: self.retry_policy(),
            persist_debounce: self.persist_debounce(),
        }
    }
}

impl Config {
    /// Loads `config.toml` from the data directory, or defaults if absent.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = config_path(data_dir);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Writes `config.toml` into the data directory, creating it if needed.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(config_path(data_dir), content)?;
        Ok(())
    }
}

/// Path of the config file inside a data directory.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Location of the local store for a backend.
pub fn storage_path(data_dir: &Path, backend: StorageBackend) -> PathBuf {
    match backend {
        StorageBackend::Sqlite => data_dir.join(SQLITE_FILE_NAME),
        StorageBackend::File => data_dir.join(FILE_STORE_DIR_NAME),
    }
}

/// Resolves the data directory from the flag, the environment, or the
/// platform default.
pub fn resolve_data_dir(flag: Option<&Path>) -> Result<PathBuf> {
    let from_env = std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    choose_data_dir(flag, from_env, dirs::data_local_dir())
}

fn choose_data_dir(
    flag: Option<&Path>,
    from_env: Option<PathBuf>,
    platform: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = from_env {
        return Ok(dir);
    }
    platform.map(|dir| dir.join("chatsync")).ok_or_else(|| {
        Error::Config(format!(
            "no data directory available\n  hint: pass --data-dir or set {}",
            DATA_DIR_ENV
        ))
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
