//! Background job: rotate administrative tokens that are close to expiry.
//!
//! Runs on a fixed interval (hourly by default). Each pass walks every stored
//! configuration through `ensure_fresh_credential`, so only configurations
//! with auto-rotation enabled and inside their window are touched.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::backend::{Backend, Request};
use crate::errors::Result;
use crate::store::Storage;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawn the background rotation task. Call this once at startup.
pub fn spawn(backend: Arc<Backend>, storage: Arc<dyn Storage>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let req = Request::new(storage);
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = run_once(&backend, &req).await {
                tracing::error!("auto-rotate job failed: {}", e);
            }
        }
    })
}

/// One pass over all configurations. Returns how many were rotated.
///
/// A failure on one configuration is logged and does not stop the pass.
pub async fn run_once(backend: &Backend, req: &Request) -> Result<usize> {
    let names = backend.list_configs(req).await?;
    let mut rotated = 0;
    for name in &names {
        match backend.ensure_fresh_credential(req, name).await {
            Ok(Some(_)) => rotated += 1,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(config_name = %name, error = %e, "scheduled rotation failed");
            }
        }
    }

    if rotated > 0 {
        tracing::info!(rotated, checked = names.len(), "scheduled rotation pass finished");
    }
    Ok(rotated)
}
