//! Rotation of the administrative token held by a configuration.
//!
//! The platform invalidates the old token and mints its replacement in a
//! single call, so there is no window with two valid administrative tokens.
//! The replacement is persisted and the cached client dropped before the
//! rotation event goes out.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::backend::{config_name, Backend, Request};
use crate::errors::{Error, Result};
use crate::models::{ConfigEntry, ConfigResponse};
use crate::notification::{Event, EVENT_CONFIG_TOKEN_ROTATE};
use crate::store::config::config_path;

/// True once the token is inside its rotation window. Tokens without an
/// expiry are never due.
pub fn rotation_due(config: &ConfigEntry, now: DateTime<Utc>) -> bool {
    let Some(remaining) = config.remaining(now) else {
        return false;
    };
    match chrono::Duration::from_std(config.auto_rotate_before) {
        Ok(threshold) => remaining <= threshold,
        Err(_) => true,
    }
}

impl Backend {
    /// Rotate the administrative token of `name` unconditionally.
    pub async fn rotate(&self, req: &Request, name: &str) -> Result<ConfigResponse> {
        let storage = req.storage()?;
        let name = config_name(name);
        debug!(config_name = name, "rotating administrative token");

        let Some(mut config) = self.load(storage, name).await? else {
            self.metrics.record_rotation("not_configured");
            return Err(Error::NotConfigured);
        };

        let client = self.client(storage, name).await?;
        let minted = match client.rotate_current_token().await {
            Ok(minted) => minted,
            Err(e) => {
                error!(config_name = name, error = %e, "failed to rotate token");
                self.metrics.record_rotation("error");
                return Err(e);
            }
        };

        config.apply_minted(&minted);
        if let Err(e) = self.commit(storage, &config).await {
            // The old token is already dead on the platform side.
            error!(
                config_name = name,
                token_id = config.token_id,
                error = %e,
                "rotated token could not be saved"
            );
            self.metrics.record_rotation("error");
            return Err(e);
        }

        self.events.emit(Event::new(
            EVENT_CONFIG_TOKEN_ROTATE,
            [
                ("path", config_path(name)),
                ("expires_at", rfc3339_or_empty(config.token_expires_at)),
                ("created_at", rfc3339_or_empty(config.token_created_at)),
                ("scopes", config.scopes.join(", ")),
                ("token_id", config.token_id.to_string()),
                ("name", minted.name.clone()),
            ],
        ));
        self.metrics.record_rotation("rotated");
        info!(
            config_name = name,
            token_id = config.token_id,
            expires_at = ?config.token_expires_at,
            "administrative token rotated"
        );
        Ok(config.response())
    }

    /// Rotate `config` if it is inside its rotation window. `Ok(None)` when
    /// nothing needed doing.
    pub async fn maybe_rotate(
        &self,
        req: &Request,
        config: &ConfigEntry,
    ) -> Result<Option<ConfigResponse>> {
        if !rotation_due(config, Utc::now()) {
            debug!(config_name = %config.name, "token not yet due for rotation");
            return Ok(None);
        }
        self.rotate(req, &config.name).await.map(Some)
    }

    /// Rotate the administrative token of `name` when auto-rotation is on and
    /// the token is due. Absent configurations are not an error here.
    pub async fn ensure_fresh_credential(
        &self,
        req: &Request,
        name: &str,
    ) -> Result<Option<ConfigResponse>> {
        let storage = req.storage()?;
        let Some(config) = self.load(storage, config_name(name)).await? else {
            return Ok(None);
        };
        if !config.auto_rotate_token {
            return Ok(None);
        }
        self.maybe_rotate(req, &config).await
    }
}

fn rfc3339_or_empty(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessToken, PlatformType};
    use std::time::Duration;

    fn config(expires_in: Option<chrono::Duration>) -> ConfigEntry {
        let now = Utc::now();
        ConfigEntry {
            name: "default".into(),
            base_url: "https://git.example.com".into(),
            platform: PlatformType::Saas,
            token: AccessToken::new("glpat-admin"),
            token_id: 1,
            scopes: vec!["api".into()],
            token_created_at: Some(now - chrono::Duration::days(30)),
            token_expires_at: expires_in.map(|d| now + d),
            auto_rotate_token: true,
            auto_rotate_before: Duration::from_secs(48 * 3600),
        }
    }

    #[test]
    fn test_no_expiry_never_due() {
        assert!(!rotation_due(&config(None), Utc::now()));
    }

    #[test]
    fn test_outside_window_not_due() {
        assert!(!rotation_due(&config(Some(chrono::Duration::days(10))), Utc::now()));
    }

    #[test]
    fn test_inside_window_due() {
        assert!(rotation_due(&config(Some(chrono::Duration::hours(47))), Utc::now()));
    }

    #[test]
    fn test_already_expired_due() {
        assert!(rotation_due(&config(Some(chrono::Duration::hours(-1))), Utc::now()));
    }

    #[test]
    fn test_rfc3339_or_empty() {
        assert_eq!(rfc3339_or_empty(None), "");
        assert!(rfc3339_or_empty(Some(Utc::now())).contains('T'));
    }
}
