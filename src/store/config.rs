//! Load/save/delete of named configuration records.
//!
//! These functions do no locking of their own; the backend wraps them in its
//! reader/writer lock.

use super::Storage;
use crate::errors::Result;
use crate::models::config::ConfigEntry;

pub const CONFIG_PREFIX: &str = "config/";

pub fn config_key(name: &str) -> String {
    format!("{}{}", CONFIG_PREFIX, name)
}

/// Path reported in events, e.g. `config/default`.
pub fn config_path(name: &str) -> String {
    config_key(name)
}

/// `Ok(None)` means "not configured", which is not an error.
pub async fn load_config(storage: &dyn Storage, name: &str) -> Result<Option<ConfigEntry>> {
    match storage.get(&config_key(name)).await? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

pub async fn save_config(storage: &dyn Storage, config: &ConfigEntry) -> Result<()> {
    let raw = serde_json::to_vec(config)?;
    storage.put(&config_key(&config.name), raw).await
}

pub async fn delete_config(storage: &dyn Storage, name: &str) -> Result<()> {
    storage.delete(&config_key(name)).await
}

pub async fn list_configs(storage: &dyn Storage) -> Result<Vec<String>> {
    storage.list(CONFIG_PREFIX).await
}
