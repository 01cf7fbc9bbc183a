//! GitLab REST adapter for [`CapabilityClient`].
//!
//! Covers only the handful of `/api/v4` calls the backend needs. A 404 from a
//! revoke endpoint becomes [`Error::CredentialNotFound`] so callers can treat
//! "already gone" as success.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{CapabilityClient, ClientFactory};
use crate::errors::{Error, Result};
use crate::models::{AccessToken, ConfigEntry, MintedToken};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitlabClient {
    http: reqwest::Client,
    api_url: String,
    token: AccessToken,
}

impl GitlabClient {
    pub fn new(base_url: &str, token: AccessToken, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| Error::invalid("base_url", format!("'{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::invalid("base_url", "scheme must be http or https"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("glsecrets/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::remote("build http client", e))?;

        Ok(Self {
            http,
            api_url: format!("{}/api/v4", parsed.as_str().trim_end_matches('/')),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    fn authed(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder.header(TOKEN_HEADER, token)
    }

    async fn execute(&self, operation: &str, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "gitlab request failed");
            Error::remote(operation, e)
        })?;
        check_status(operation, resp).await
    }

    async fn delete(&self, operation: &str, path: &str) -> Result<()> {
        let builder = self.authed(self.http.delete(self.url(path)), self.token.expose());
        self.execute(operation, builder).await?;
        Ok(())
    }

    /// Service account tokens are revoked by authenticating as the token itself.
    async fn revoke_self(&self, operation: &str, token: &str) -> Result<()> {
        let builder = self.authed(
            self.http.delete(self.url("personal_access_tokens/self")),
            token,
        );
        match self.execute(operation, builder).await {
            // A token that no longer authenticates is already revoked or expired.
            Err(Error::Remote { message, .. }) if message.starts_with("status=401") => {
                Err(Error::CredentialNotFound)
            }
            other => other.map(|_| ()),
        }
    }
}

async fn check_status(operation: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::CredentialNotFound);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::remote(
        operation,
        format!("status={}, body={}", status.as_u16(), body),
    ))
}

#[async_trait]
impl CapabilityClient for GitlabClient {
    async fn current_token_info(&self) -> Result<MintedToken> {
        let builder = self.authed(
            self.http.get(self.url("personal_access_tokens/self")),
            self.token.expose(),
        );
        let resp = self.execute("token info", builder).await?;
        let pat: PersonalAccessToken = resp
            .json()
            .await
            .map_err(|e| Error::remote("token info", e))?;
        Ok(pat.into_minted(Some(&self.token)))
    }

    async fn rotate_current_token(&self) -> Result<MintedToken> {
        // Keep the lifetime of the token being replaced.
        let current = self.current_token_info().await?;
        let expires_at = match (current.created_at, current.expires_at) {
            (Some(created), Some(expires)) if expires > created => {
                Some((Utc::now() + (expires - created)).date_naive())
            }
            _ => None,
        };

        let mut builder = self.authed(
            self.http.post(self.url("personal_access_tokens/self/rotate")),
            self.token.expose(),
        );
        if let Some(date) = expires_at {
            builder = builder.json(&serde_json::json!({
                "expires_at": date.format("%Y-%m-%d").to_string(),
            }));
        }

        let resp = self.execute("rotate token", builder).await?;
        let pat: PersonalAccessToken = resp
            .json()
            .await
            .map_err(|e| Error::remote("rotate token", e))?;
        if pat.token.as_deref().map_or(true, str::is_empty) {
            return Err(Error::remote("rotate token", "response carried no token"));
        }
        Ok(pat.into_minted(None))
    }

    async fn revoke_personal_access_token(&self, token_id: i64) -> Result<()> {
        self.delete(
            "revoke personal access token",
            &format!("personal_access_tokens/{}", token_id),
        )
        .await
    }

    async fn revoke_project_access_token(&self, token_id: i64, project_id: &str) -> Result<()> {
        self.delete(
            "revoke project access token",
            &format!(
                "projects/{}/access_tokens/{}",
                urlencoding::encode(project_id),
                token_id
            ),
        )
        .await
    }

    async fn revoke_group_access_token(&self, token_id: i64, group_id: &str) -> Result<()> {
        self.delete(
            "revoke group access token",
            &format!(
                "groups/{}/access_tokens/{}",
                urlencoding::encode(group_id),
                token_id
            ),
        )
        .await
    }

    async fn revoke_user_service_account_access_token(&self, token: &str) -> Result<()> {
        self.revoke_self("revoke user service account token", token)
            .await
    }

    async fn revoke_group_service_account_access_token(&self, token: &str) -> Result<()> {
        self.revoke_self("revoke group service account token", token)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct PersonalAccessToken {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    /// GitLab reports expiry as a plain date (`2024-10-20`).
    #[serde(default)]
    expires_at: Option<String>,
}

impl PersonalAccessToken {
    fn into_minted(self, fallback: Option<&AccessToken>) -> MintedToken {
        let token = match self.token {
            Some(value) if !value.is_empty() => AccessToken::new(value),
            _ => fallback.cloned().unwrap_or_default(),
        };
        MintedToken {
            token_id: self.id,
            name: self.name,
            token,
            scopes: self.scopes,
            created_at: self.created_at,
            expires_at: self.expires_at.as_deref().and_then(parse_expiry),
        }
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Builds [`GitlabClient`]s from stored configuration.
#[derive(Debug, Clone)]
pub struct GitlabClientFactory {
    timeout: Duration,
}

impl GitlabClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GitlabClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ClientFactory for GitlabClientFactory {
    fn build(&self, config: &ConfigEntry) -> Result<Arc<dyn CapabilityClient>> {
        let client = GitlabClient::new(&config.base_url, config.token.clone(), self.timeout)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_expiry_date_only() {
        assert_eq!(
            parse_expiry("2024-10-20"),
            Some(Utc.with_ymd_and_hms(2024, 10, 20, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_expiry_rfc3339() {
        assert_eq!(
            parse_expiry("2024-10-20T12:30:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 10, 20, 12, 30, 0).unwrap())
        );
        assert_eq!(parse_expiry("never"), None);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = GitlabClient::new("not a url", AccessToken::new("t"), DEFAULT_TIMEOUT)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidValue { .. }));
        let err = GitlabClient::new("ftp://gitlab.com", AccessToken::new("t"), DEFAULT_TIMEOUT)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn test_api_url_normalized() {
        let client =
            GitlabClient::new("https://git.example.com/", AccessToken::new("t"), DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(
            client.url("personal_access_tokens/self"),
            "https://git.example.com/api/v4/personal_access_tokens/self"
        );
    }
}
