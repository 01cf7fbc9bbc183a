use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Directory for the file-backed configuration store.
    pub data_dir: PathBuf,
    /// Comma-separated list of webhook URLs notified on every event.
    pub webhook_urls: Vec<String>,
    /// Signs webhook bodies with HMAC-SHA256 when set.
    pub webhook_secret: Option<String>,
    /// Upper bound on a single call to the platform.
    pub remote_timeout: Duration,
    /// Prepended to event names on the wire, e.g. "gitlab/token-revoke".
    pub event_prefix: String,
    /// Period of the background rotation job. `None` disables it.
    pub rotate_interval: Option<Duration>,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a [`Config`] from any key lookup. `load` passes the process environment.
pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let port = match var("GLSECRETS_PORT") {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("GLSECRETS_PORT '{}': {}", raw, e))?,
        None => 8200,
    };

    let remote_timeout_secs: u64 = var("GLSECRETS_REMOTE_TIMEOUT_SECS")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(30);
    if remote_timeout_secs == 0 {
        anyhow::bail!("GLSECRETS_REMOTE_TIMEOUT_SECS must be greater than zero");
    }

    let rotate_interval_secs: u64 = var("GLSECRETS_ROTATE_INTERVAL_SECS")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(3600);

    Ok(Config {
        port,
        data_dir: var("GLSECRETS_DATA_DIR")
            .unwrap_or_else(|| "./data".into())
            .into(),
        webhook_urls: var("GLSECRETS_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        webhook_secret: var("GLSECRETS_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
        remote_timeout: Duration::from_secs(remote_timeout_secs),
        event_prefix: var("GLSECRETS_EVENT_PREFIX").unwrap_or_else(|| "gitlab".into()),
        rotate_interval: (rotate_interval_secs > 0).then(|| Duration::from_secs(rotate_interval_secs)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8200);
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert!(cfg.webhook_urls.is_empty());
        assert!(cfg.webhook_secret.is_none());
        assert_eq!(cfg.remote_timeout, Duration::from_secs(30));
        assert_eq!(cfg.event_prefix, "gitlab");
        assert_eq!(cfg.rotate_interval, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_webhook_urls_split_and_trimmed() {
        let cfg = from_lookup(lookup(&[(
            "GLSECRETS_WEBHOOK_URLS",
            " https://a.example/hook , ,https://b.example/hook",
        )]))
        .unwrap();
        assert_eq!(
            cfg.webhook_urls,
            vec!["https://a.example/hook", "https://b.example/hook"]
        );
    }

    #[test]
    fn test_zero_interval_disables_job() {
        let cfg = from_lookup(lookup(&[("GLSECRETS_ROTATE_INTERVAL_SECS", "0")])).unwrap();
        assert!(cfg.rotate_interval.is_none());
    }

    #[test]
    fn test_bad_port_is_error() {
        assert!(from_lookup(lookup(&[("GLSECRETS_PORT", "http")])).is_err());
    }

    #[test]
    fn test_zero_timeout_is_error() {
        assert!(from_lookup(lookup(&[("GLSECRETS_REMOTE_TIMEOUT_SECS", "0")])).is_err());
    }
}
