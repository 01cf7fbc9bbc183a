use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::client::CapabilityClient;

/// Memoized capability clients, keyed by configuration name.
///
/// Entries never expire on their own. The only correctness rule is that an
/// entry is cleared whenever the configuration behind it changes (rotation,
/// write, patch, delete), which the backend does under its exclusive lock.
#[derive(Clone, Default)]
pub struct ClientCache {
    local: Arc<DashMap<String, Arc<dyn CapabilityClient>>>,
    hits: Arc<AtomicU64>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityClient>> {
        let entry = self.local.get(name)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value().clone())
    }

    /// `None` clears the entry.
    pub fn set(&self, name: &str, client: Option<Arc<dyn CapabilityClient>>) {
        match client {
            Some(client) => {
                self.local.insert(name.to_string(), client);
            }
            None => {
                self.local.remove(name);
            }
        }
    }

    pub fn invalidate(&self, name: &str) {
        self.set(name, None);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.local.contains_key(name)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}
