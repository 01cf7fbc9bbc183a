use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::models::token::{AccessToken, MintedToken};

pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Lower bound for `auto_rotate_before`.
pub const MIN_AUTO_ROTATE_BEFORE: Duration = Duration::from_secs(24 * 3600);
/// Upper bound for `auto_rotate_before` (roughly one month).
pub const MAX_AUTO_ROTATE_BEFORE: Duration = Duration::from_secs(730 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformType {
    #[serde(rename = "self-managed")]
    SelfManaged,
    #[serde(rename = "saas")]
    Saas,
    #[serde(rename = "dedicated")]
    Dedicated,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::SelfManaged => "self-managed",
            PlatformType::Saas => "saas",
            PlatformType::Dedicated => "dedicated",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "self-managed" => Ok(PlatformType::SelfManaged),
            "saas" => Ok(PlatformType::Saas),
            "dedicated" => Ok(PlatformType::Dedicated),
            other => Err(Error::invalid("type", format!("unknown platform type '{}'", other))),
        }
    }
}

/// Stored configuration record. One per name; holds the administrative token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub base_url: String,
    #[serde(rename = "type")]
    pub platform: PlatformType,
    pub token: AccessToken,
    pub token_id: i64,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub token_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_rotate_token: bool,
    #[serde(default = "default_auto_rotate_before", with = "duration_secs")]
    pub auto_rotate_before: Duration,
}

fn default_auto_rotate_before() -> Duration {
    MIN_AUTO_ROTATE_BEFORE
}

impl ConfigEntry {
    /// Replace the administrative token with a freshly minted one.
    ///
    /// Creation time only ever lands in `token_created_at`; the expiry is kept
    /// when the platform does not report a new one.
    pub fn apply_minted(&mut self, minted: &MintedToken) {
        self.token = minted.token.clone();
        self.token_id = minted.token_id;
        self.scopes = minted.scopes.clone();
        if let Some(expires_at) = minted.expires_at {
            self.token_expires_at = Some(expires_at);
        }
        if let Some(created_at) = minted.created_at {
            self.token_created_at = Some(created_at);
        }
    }

    /// Time left before the administrative token expires. `None` for tokens
    /// without an expiry.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.token_expires_at.map(|expires_at| expires_at - now)
    }

    pub fn response(&self) -> ConfigResponse {
        ConfigResponse::from(self)
    }
}

/// Outward view of a configuration. Carries the token fingerprint, never the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub name: String,
    pub base_url: String,
    #[serde(rename = "type")]
    pub platform: PlatformType,
    pub token_id: i64,
    pub token_sha256_hash: String,
    pub scopes: Vec<String>,
    pub token_created_at: Option<DateTime<Utc>>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub auto_rotate_token: bool,
    /// Seconds.
    pub auto_rotate_before: u64,
}

impl From<&ConfigEntry> for ConfigResponse {
    fn from(entry: &ConfigEntry) -> Self {
        Self {
            name: entry.name.clone(),
            base_url: entry.base_url.clone(),
            platform: entry.platform,
            token_id: entry.token_id,
            token_sha256_hash: entry.token.fingerprint(),
            scopes: entry.scopes.clone(),
            token_created_at: entry.token_created_at,
            token_expires_at: entry.token_expires_at,
            auto_rotate_token: entry.auto_rotate_token,
            auto_rotate_before: entry.auto_rotate_before.as_secs(),
        }
    }
}

/// Write/patch payload. Every field optional so the same type serves both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigInput {
    pub token: Option<String>,
    pub base_url: Option<String>,
    #[serde(rename = "type")]
    pub platform: Option<String>,
    pub auto_rotate_token: Option<bool>,
    /// Duration string such as `24h`, `2d`, `90m` or plain seconds.
    pub auto_rotate_before: Option<String>,
}

/// Parse `auto_rotate_before` and enforce the allowed window.
pub fn parse_auto_rotate_before(raw: &str) -> Result<Duration, Error> {
    let secs = parse_duration_secs(raw)
        .ok_or_else(|| Error::invalid("auto_rotate_before", format!("cannot parse '{}'", raw)))?;
    let value = Duration::from_secs(secs);
    if value < MIN_AUTO_ROTATE_BEFORE || value > MAX_AUTO_ROTATE_BEFORE {
        return Err(Error::invalid(
            "auto_rotate_before",
            format!(
                "must be between {}h and {}h",
                MIN_AUTO_ROTATE_BEFORE.as_secs() / 3600,
                MAX_AUTO_ROTATE_BEFORE.as_secs() / 3600
            ),
        ));
    }
    Ok(value)
}

/// Supported formats: "30s", "15m", "24h", "2d", or plain seconds.
/// `None` when unparseable or too large for `u64` seconds.
fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    let (val, unit) = if let Some(val) = s.strip_suffix('s') {
        (val, 1)
    } else if let Some(val) = s.strip_suffix('m') {
        (val, 60)
    } else if let Some(val) = s.strip_suffix('h') {
        (val, 3600)
    } else if let Some(val) = s.strip_suffix('d') {
        (val, 86400)
    } else {
        (s, 1)
    };
    val.parse::<u64>().ok()?.checked_mul(unit)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
