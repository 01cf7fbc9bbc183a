use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result};
use crate::models::config::DEFAULT_CONFIG_NAME;
use crate::models::token::{AccessToken, TokenType};

/// A leased secret handed back by the host when the lease ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeasedSecret {
    pub lease_id: String,
    #[serde(default)]
    pub internal_data: Map<String, Value>,
}

impl LeasedSecret {
    pub fn new(lease_id: impl Into<String>, internal_data: Map<String, Value>) -> Self {
        Self {
            lease_id: lease_id.into(),
            internal_data,
        }
    }
}

/// What to call on the remote platform to revoke a derived token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeTarget {
    Personal { token_id: i64 },
    Project { token_id: i64, project_id: String },
    Group { token_id: i64, group_id: String },
    UserServiceAccount { token: AccessToken },
    GroupServiceAccount { token: AccessToken },
}

/// Parsed revocation metadata of a derived token.
#[derive(Debug, Clone)]
pub struct RevokeMetadata {
    pub config_name: String,
    /// Absent for service account tokens, which are revoked by value.
    pub token_id: Option<i64>,
    pub gitlab_revokes_token: bool,
    pub token_type: TokenType,
    pub target: RevokeTarget,
    pub name: String,
    pub path: String,
}

impl RevokeMetadata {
    /// Parse and validate the internal data of a leased secret.
    ///
    /// Field order matters for error reporting: a malformed `token_id` is
    /// reported first, then the revoke flag, then the variant and its
    /// required fields. Only id-based variants need `token_id` at all.
    pub fn parse(data: &Map<String, Value>) -> Result<Self> {
        let config_name = string_field(data, "config_name")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());

        let token_id = int_field(data, "token_id")?;
        let gitlab_revokes_token = bool_field(data, "gitlab_revokes_token")?;
        let parent_id = string_field(data, "parent_id").unwrap_or_default();

        let token_type: TokenType = string_field(data, "token_type")
            .ok_or_else(|| Error::invalid("token_type", "missing"))?
            .parse()?;

        if token_type.requires_parent() && parent_id.is_empty() {
            return Err(Error::invalid(
                "parent_id",
                format!("required for {} tokens", token_type),
            ));
        }

        let id = || token_id.ok_or_else(|| Error::invalid("token_id", "missing"));
        let target = match token_type {
            TokenType::Personal => RevokeTarget::Personal { token_id: id()? },
            TokenType::Project => RevokeTarget::Project {
                token_id: id()?,
                project_id: parent_id,
            },
            TokenType::Group => RevokeTarget::Group {
                token_id: id()?,
                group_id: parent_id,
            },
            TokenType::UserServiceAccount => RevokeTarget::UserServiceAccount {
                token: raw_token(data, token_type)?,
            },
            TokenType::GroupServiceAccount => RevokeTarget::GroupServiceAccount {
                token: raw_token(data, token_type)?,
            },
        };

        Ok(Self {
            config_name,
            token_id,
            gitlab_revokes_token,
            token_type,
            target,
            name: string_field(data, "name").unwrap_or_default(),
            path: string_field(data, "path").unwrap_or_default(),
        })
    }

    /// Whether this backend has to call the remote revoke API itself.
    pub fn vault_revokes_token(&self) -> bool {
        !self.gitlab_revokes_token
    }

    /// `token_id` as reported in events and errors; empty when absent.
    pub fn token_id_label(&self) -> String {
        self.token_id.map(|id| id.to_string()).unwrap_or_default()
    }
}

fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `Ok(None)` when the key is absent; an error when present but not an integer.
fn int_field(data: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| Error::invalid(key, format!("'{}' is not an integer", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::invalid(key, format!("'{}' is not an integer", s))),
        Some(other) => Err(Error::invalid(key, format!("unexpected value {}", other))),
    }
}

fn bool_field(data: &Map<String, Value>, key: &str) -> Result<bool> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" | "" => Ok(false),
            _ => Err(Error::invalid(key, format!("'{}' is not a boolean", s))),
        },
        Some(other) => Err(Error::invalid(key, format!("unexpected value {}", other))),
    }
}

fn raw_token(data: &Map<String, Value>, token_type: TokenType) -> Result<AccessToken> {
    string_field(data, "token")
        .filter(|s| !s.is_empty())
        .map(AccessToken::new)
        .ok_or_else(|| Error::invalid("token", format!("required for {} tokens", token_type)))
}
