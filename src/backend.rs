//! The secrets backend: configuration records, the client cache and the lock
//! that keeps them consistent.
//!
//! Lock discipline. One reader/writer lock guards every configuration of a
//! backend. Loading a configuration and filling the client cache happen under
//! the shared side. Persisting a configuration and clearing its cached client
//! happen together under the exclusive side. Remote calls never run while the
//! lock is held.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::ClientCache;
use crate::client::{CapabilityClient, ClientFactory};
use crate::errors::{Error, Result};
use crate::metrics::Metrics;
use crate::models::config::{parse_auto_rotate_before, MIN_AUTO_ROTATE_BEFORE};
use crate::models::{
    AccessToken, ConfigEntry, ConfigInput, ConfigResponse, LeasedSecret, PlatformType,
    DEFAULT_CONFIG_NAME,
};
use crate::notification::{
    Event, EventSink, LogSink, EVENT_CONFIG_DELETE, EVENT_CONFIG_PATCH, EVENT_CONFIG_WRITE,
};
use crate::store::config::{self as config_store, config_path};
use crate::store::Storage;

/// Per-request context supplied by the host.
///
/// Both fields are optional so that a host which forgets one gets
/// [`Error::MissingDependency`] instead of a panic.
#[derive(Clone, Default)]
pub struct Request {
    pub storage: Option<Arc<dyn Storage>>,
    pub secret: Option<LeasedSecret>,
}

impl Request {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage: Some(storage),
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: LeasedSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn storage(&self) -> Result<&dyn Storage> {
        self.storage
            .as_deref()
            .ok_or(Error::MissingDependency("storage"))
    }

    pub fn secret(&self) -> Result<&LeasedSecret> {
        self.secret
            .as_ref()
            .ok_or(Error::MissingDependency("secret"))
    }
}

pub struct Backend {
    pub(crate) lock: RwLock<()>,
    pub(crate) clients: ClientCache,
    pub(crate) factory: Arc<dyn ClientFactory>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) metrics: Metrics,
}

impl Backend {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Result<Self> {
        Ok(Self {
            lock: RwLock::new(()),
            clients: ClientCache::new(),
            factory,
            events: Arc::new(LogSink),
            metrics: Metrics::new()?,
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Load a configuration under the shared lock.
    pub(crate) async fn load(&self, storage: &dyn Storage, name: &str) -> Result<Option<ConfigEntry>> {
        let _guard = self.lock.read().await;
        config_store::load_config(storage, name).await
    }

    /// Persist `config` and drop its cached client in one exclusive section.
    pub(crate) async fn commit(&self, storage: &dyn Storage, config: &ConfigEntry) -> Result<()> {
        let _guard = self.lock.write().await;
        config_store::save_config(storage, config).await?;
        self.clients.invalidate(&config.name);
        Ok(())
    }

    /// Cached client for `name`, built from the stored configuration on a miss.
    ///
    /// The configuration load and the cache fill share one read section so a
    /// concurrent commit can never be overwritten by a client built from the
    /// record it just replaced.
    pub async fn client(&self, storage: &dyn Storage, name: &str) -> Result<Arc<dyn CapabilityClient>> {
        let _guard = self.lock.read().await;
        if let Some(client) = self.clients.get(name) {
            return Ok(client);
        }

        let config = config_store::load_config(storage, name)
            .await?
            .ok_or(Error::NotConfigured)?;
        let client = self.factory.build(&config)?;
        self.clients.set(name, Some(client.clone()));
        debug!(config_name = name, "built capability client");
        Ok(client)
    }

    // ── Configuration ─────────────────────────────────────────────

    /// Create or replace a configuration. The token is checked against the
    /// platform before anything is stored.
    pub async fn write_config(
        &self,
        req: &Request,
        name: &str,
        input: ConfigInput,
    ) -> Result<ConfigResponse> {
        let storage = req.storage()?;
        let name = config_name(name);

        let mut missing = Vec::new();
        let token = non_empty(input.token);
        let base_url = non_empty(input.base_url);
        let platform = non_empty(input.platform);
        if token.is_none() {
            missing.push("token");
        }
        if base_url.is_none() {
            missing.push("base_url");
        }
        if platform.is_none() {
            missing.push("type");
        }
        let (Some(token), Some(base_url), Some(platform)) = (token, base_url, platform) else {
            return Err(Error::FieldsRequired(missing));
        };

        let platform: PlatformType = platform.parse()?;
        let auto_rotate_before = match input.auto_rotate_before.as_deref() {
            Some(raw) => parse_auto_rotate_before(raw)?,
            None => MIN_AUTO_ROTATE_BEFORE,
        };

        let mut config = ConfigEntry {
            name: name.to_string(),
            base_url,
            platform,
            token: AccessToken::new(token),
            token_id: 0,
            scopes: Vec::new(),
            token_created_at: None,
            token_expires_at: None,
            auto_rotate_token: input.auto_rotate_token.unwrap_or(false),
            auto_rotate_before,
        };
        self.verify_token(&mut config).await?;

        self.commit(storage, &config).await?;
        self.emit_config_event(EVENT_CONFIG_WRITE, &config);
        info!(config_name = name, token_id = config.token_id, "configuration written");
        Ok(config.response())
    }

    /// Update selected fields of an existing configuration.
    pub async fn patch_config(
        &self,
        req: &Request,
        name: &str,
        input: ConfigInput,
    ) -> Result<ConfigResponse> {
        let storage = req.storage()?;
        let name = config_name(name);

        let mut config = self
            .load(storage, name)
            .await?
            .ok_or(Error::NotConfigured)?;

        if let Some(base_url) = non_empty(input.base_url) {
            config.base_url = base_url;
        }
        if let Some(platform) = non_empty(input.platform) {
            config.platform = platform.parse()?;
        }
        if let Some(auto_rotate_token) = input.auto_rotate_token {
            config.auto_rotate_token = auto_rotate_token;
        }
        if let Some(raw) = input.auto_rotate_before.as_deref() {
            config.auto_rotate_before = parse_auto_rotate_before(raw)?;
        }

        let token_changed = match non_empty(input.token) {
            Some(token) if token != config.token.expose() => {
                config.token = AccessToken::new(token);
                true
            }
            _ => false,
        };
        if token_changed {
            self.verify_token(&mut config).await?;
        }

        self.commit(storage, &config).await?;
        self.emit_config_event(EVENT_CONFIG_PATCH, &config);
        info!(config_name = name, token_changed, "configuration patched");
        Ok(config.response())
    }

    pub async fn read_config(&self, req: &Request, name: &str) -> Result<ConfigResponse> {
        let storage = req.storage()?;
        self.load(storage, config_name(name))
            .await?
            .map(|config| config.response())
            .ok_or(Error::NotConfigured)
    }

    pub async fn delete_config(&self, req: &Request, name: &str) -> Result<()> {
        let storage = req.storage()?;
        let name = config_name(name);
        {
            let _guard = self.lock.write().await;
            if config_store::load_config(storage, name).await?.is_none() {
                return Err(Error::NotConfigured);
            }
            config_store::delete_config(storage, name).await?;
            self.clients.invalidate(name);
        }

        self.events.emit(Event::new(
            EVENT_CONFIG_DELETE,
            [("path", config_path(name))],
        ));
        info!(config_name = name, "configuration deleted");
        Ok(())
    }

    pub async fn list_configs(&self, req: &Request) -> Result<Vec<String>> {
        let storage = req.storage()?;
        let _guard = self.lock.read().await;
        config_store::list_configs(storage).await
    }

    /// Ask the platform about `config.token` and copy what it reports.
    async fn verify_token(&self, config: &mut ConfigEntry) -> Result<()> {
        let client = self.factory.build(config)?;
        let info = client.current_token_info().await.map_err(|e| {
            warn!(config_name = %config.name, error = %e, "token verification failed");
            e.context("verify token")
        })?;
        config.apply_minted(&info);
        Ok(())
    }

    fn emit_config_event(&self, name: &str, config: &ConfigEntry) {
        self.events.emit(Event::new(
            name,
            [
                ("path", config_path(&config.name)),
                ("base_url", config.base_url.clone()),
                ("type", config.platform.to_string()),
                ("token_id", config.token_id.to_string()),
                ("scopes", config.scopes.join(", ")),
                ("auto_rotate_token", config.auto_rotate_token.to_string()),
                (
                    "auto_rotate_before",
                    humanize(config.auto_rotate_before),
                ),
            ],
        ));
    }
}

/// Empty names address the default configuration.
pub(crate) fn config_name(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_CONFIG_NAME
    } else {
        name
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn humanize(d: Duration) -> String {
    let secs = d.as_secs();
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}s", secs)
    }
}
