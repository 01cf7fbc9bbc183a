//! Revocation of derived tokens when their lease ends.

use tracing::{debug, error, info, warn};

use crate::backend::{Backend, Request};
use crate::client::CapabilityClient;
use crate::errors::Result;
use crate::models::{RevokeMetadata, RevokeTarget};
use crate::notification::{Event, EVENT_TOKEN_REVOKE};

/// How a lease ended on the platform side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The platform revoked the token on our request.
    Revoked,
    /// The platform no longer knew the token.
    AlreadyGone,
    /// The platform expires the token on its own; nothing was called.
    LeftToExpire,
}

impl RevokeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevokeOutcome::Revoked => "revoked",
            RevokeOutcome::AlreadyGone => "already_gone",
            RevokeOutcome::LeftToExpire => "skipped",
        }
    }
}

impl Backend {
    /// Revoke the derived token described by the request's leased secret.
    pub async fn revoke(&self, req: &Request) -> Result<RevokeOutcome> {
        let storage = req.storage()?;
        let secret = req.secret()?;
        let meta = RevokeMetadata::parse(&secret.internal_data)?;
        let token_type = meta.token_type.as_str();
        let token_id = meta.token_id_label();

        let outcome = if meta.vault_revokes_token() {
            if let Err(e) = self.ensure_fresh_credential(req, &meta.config_name).await {
                warn!(
                    config_name = %meta.config_name,
                    error = %e,
                    "auto-rotation before revoke failed, using current token"
                );
            }

            let client = match self.client(storage, &meta.config_name).await {
                Ok(client) => client,
                Err(e) => {
                    error!(
                        lease_id = %secret.lease_id,
                        config_name = %meta.config_name,
                        token_type,
                        error = %e,
                        "cannot get client to revoke token"
                    );
                    self.metrics.record_revocation(token_type, "error");
                    return Err(e.context(format!(
                        "revoke token of {}: cannot get client",
                        meta.config_name
                    )));
                }
            };
            match dispatch(client.as_ref(), &meta.target).await {
                Ok(()) => RevokeOutcome::Revoked,
                Err(e) if e.is_not_found() => {
                    debug!(
                        lease_id = %secret.lease_id,
                        token_id = %token_id,
                        "token already gone on the platform"
                    );
                    RevokeOutcome::AlreadyGone
                }
                Err(e) => {
                    error!(
                        lease_id = %secret.lease_id,
                        config_name = %meta.config_name,
                        token_id = %token_id,
                        token_type,
                        error = %e,
                        "failed to revoke token"
                    );
                    self.metrics.record_revocation(token_type, "error");
                    return Err(e.context(format!(
                        "revoke token {} ({}) of {}",
                        token_id, token_type, meta.config_name
                    )));
                }
            }
        } else {
            RevokeOutcome::LeftToExpire
        };

        self.events.emit(Event::new(
            EVENT_TOKEN_REVOKE,
            [
                ("lease_id", secret.lease_id.clone()),
                ("path", meta.path.clone()),
                ("name", meta.name.clone()),
                ("token_id", token_id.clone()),
                ("token_type", token_type.to_string()),
                ("gitlab_revokes_token", meta.gitlab_revokes_token.to_string()),
            ],
        ));
        self.metrics.record_revocation(token_type, outcome.as_str());
        info!(
            lease_id = %secret.lease_id,
            token_id = %token_id,
            token_type,
            outcome = outcome.as_str(),
            "lease revoked"
        );
        Ok(outcome)
    }
}

async fn dispatch(client: &dyn CapabilityClient, target: &RevokeTarget) -> Result<()> {
    match target {
        RevokeTarget::Personal { token_id } => client.revoke_personal_access_token(*token_id).await,
        RevokeTarget::Project {
            token_id,
            project_id,
        } => client.revoke_project_access_token(*token_id, project_id).await,
        RevokeTarget::Group { token_id, group_id } => {
            client.revoke_group_access_token(*token_id, group_id).await
        }
        RevokeTarget::UserServiceAccount { token } => {
            client
                .revoke_user_service_account_access_token(token.expose())
                .await
        }
        RevokeTarget::GroupServiceAccount { token } => {
            client
                .revoke_group_service_account_access_token(token.expose())
                .await
        }
    }
}
