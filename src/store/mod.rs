//! Key/value storage seam.
//!
//! The backend never talks to a storage engine directly; it goes through
//! [`Storage`], which only knows opaque byte values under string keys.
//!
//!   - [`memory::MemoryStorage`]: in-process map (tests, ephemeral runs).
//!   - [`file::FileStorage`]: one JSON file per key under a data directory.
//!
//! Configuration records live under `config/<name>` (see [`config`]).

use async_trait::async_trait;

use crate::errors::Result;

pub mod config;
pub mod file;
pub mod memory;

#[async_trait]
pub trait Storage: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys below `prefix`, with the prefix stripped, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}
