//! glsecrets: GitLab access token lifecycle manager.
//!
//! Keeps administrative tokens per named configuration, rotates them before
//! they expire, and revokes the derived tokens handed out under leases.

pub mod api;
pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod notification;
pub mod revoke;
pub mod rotation;
pub mod store;

pub use backend::{Backend, Request};
pub use errors::{Error, Result};
pub use revoke::RevokeOutcome;
