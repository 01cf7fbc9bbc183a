use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::errors::Error;

/// Raw access token value. Zeroed on drop and never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of the token value.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

impl Drop for AccessToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Variant of a derived credential. Each variant has its own identifier and
/// revoke semantics on the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Personal,
    Project,
    Group,
    UserServiceAccount,
    GroupServiceAccount,
}

impl TokenType {
    pub const ALL: [TokenType; 5] = [
        TokenType::Personal,
        TokenType::Project,
        TokenType::Group,
        TokenType::UserServiceAccount,
        TokenType::GroupServiceAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Personal => "personal",
            TokenType::Project => "project",
            TokenType::Group => "group",
            TokenType::UserServiceAccount => "user_service_account",
            TokenType::GroupServiceAccount => "group_service_account",
        }
    }

    /// Project and group tokens are scoped to an owning resource.
    pub fn requires_parent(&self) -> bool {
        matches!(self, TokenType::Project | TokenType::Group)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid("token_type", format!("unknown token type '{}'", s)))
    }
}

/// A credential freshly minted by the remote platform (rotate or issue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintedToken {
    pub token_id: i64,
    pub name: String,
    pub token: AccessToken,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}
