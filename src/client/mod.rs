//! Capability interface to the remote platform.
//!
//! The backend only ever calls the operations below. How a client talks to
//! the platform is up to the implementation behind [`ClientFactory`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{ConfigEntry, MintedToken};

pub mod gitlab;

#[async_trait]
pub trait CapabilityClient: Send + Sync {
    /// Describe the token the client is authenticated with.
    async fn current_token_info(&self) -> Result<MintedToken>;

    /// Invalidate the current token and mint its replacement in one remote call.
    async fn rotate_current_token(&self) -> Result<MintedToken>;

    async fn revoke_personal_access_token(&self, token_id: i64) -> Result<()>;

    async fn revoke_project_access_token(&self, token_id: i64, project_id: &str) -> Result<()>;

    async fn revoke_group_access_token(&self, token_id: i64, group_id: &str) -> Result<()>;

    async fn revoke_user_service_account_access_token(&self, token: &str) -> Result<()>;

    async fn revoke_group_service_account_access_token(&self, token: &str) -> Result<()>;
}

/// Builds a client from a stored configuration. Must not do network I/O; it
/// runs while the backend holds its configuration lock.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &ConfigEntry) -> Result<Arc<dyn CapabilityClient>>;
}
