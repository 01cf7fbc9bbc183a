//! Shared fixtures: an in-process stand-in for the remote platform and a
//! harness that wires it into a backend over in-memory storage.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use glsecrets::client::{CapabilityClient, ClientFactory};
use glsecrets::models::{AccessToken, ConfigEntry, LeasedSecret, MintedToken, PlatformType};
use glsecrets::notification::MemorySink;
use glsecrets::store::config::save_config;
use glsecrets::store::memory::MemoryStorage;
use glsecrets::{Backend, Error, Request, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    TokenInfo,
    Rotate,
    RevokePersonal(i64),
    RevokeProject(i64, String),
    RevokeGroup(i64, String),
    RevokeUserServiceAccount(String),
    RevokeGroupServiceAccount(String),
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    NotFound,
    Remote,
}

impl Failure {
    fn error(self, operation: &str) -> Error {
        match self {
            Failure::NotFound => Error::CredentialNotFound,
            Failure::Remote => Error::remote(operation, "status=500, body=boom"),
        }
    }
}

/// Records every call and answers from configurable state.
#[derive(Default)]
pub struct Platform {
    calls: Mutex<Vec<Call>>,
    built_with: Mutex<Vec<String>>,
    revoke_failure: Mutex<Option<Failure>>,
    rotate_failure: Mutex<Option<Failure>>,
    info_failure: Mutex<Option<Failure>>,
    rotate_delay: Mutex<Option<Duration>>,
    info_expires_in: Mutex<Option<chrono::Duration>>,
    rotations: AtomicI64,
}

impl Platform {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Tokens that clients were built with, in build order.
    pub fn built_with(&self) -> Vec<String> {
        self.built_with.lock().unwrap().clone()
    }

    pub fn fail_revoke(&self, failure: Failure) {
        *self.revoke_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_rotate(&self, failure: Failure) {
        *self.rotate_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_info(&self, failure: Failure) {
        *self.info_failure.lock().unwrap() = Some(failure);
    }

    pub fn delay_rotate(&self, delay: Duration) {
        *self.rotate_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_info_expiry(&self, expires_in: chrono::Duration) {
        *self.info_expires_in.lock().unwrap() = Some(expires_in);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn revoke(&self, call: Call) -> Result<()> {
        self.record(call);
        match *self.revoke_failure.lock().unwrap() {
            Some(failure) => Err(failure.error("revoke")),
            None => Ok(()),
        }
    }
}

pub struct FakeClient {
    platform: Arc<Platform>,
    token: String,
}

#[async_trait]
impl CapabilityClient for FakeClient {
    async fn current_token_info(&self) -> Result<MintedToken> {
        self.platform.record(Call::TokenInfo);
        if let Some(failure) = *self.platform.info_failure.lock().unwrap() {
            return Err(failure.error("token info"));
        }
        let now = Utc::now();
        Ok(MintedToken {
            token_id: 1,
            name: "admin".into(),
            token: AccessToken::new(self.token.clone()),
            scopes: vec!["api".into(), "read_user".into()],
            created_at: Some(now - chrono::Duration::days(1)),
            expires_at: self.platform.info_expires_in.lock().unwrap().map(|d| now + d),
        })
    }

    async fn rotate_current_token(&self) -> Result<MintedToken> {
        self.platform.record(Call::Rotate);
        let delay = *self.platform.rotate_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = *self.platform.rotate_failure.lock().unwrap() {
            return Err(failure.error("rotate token"));
        }
        let n = self.platform.rotations.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        Ok(MintedToken {
            token_id: 100 + n,
            name: "admin".into(),
            token: AccessToken::new(format!("glpat-rotated-{}", n)),
            scopes: vec!["api".into()],
            created_at: Some(now),
            expires_at: Some(now + chrono::Duration::days(90)),
        })
    }

    async fn revoke_personal_access_token(&self, token_id: i64) -> Result<()> {
        self.platform.revoke(Call::RevokePersonal(token_id))
    }

    async fn revoke_project_access_token(&self, token_id: i64, project_id: &str) -> Result<()> {
        self.platform
            .revoke(Call::RevokeProject(token_id, project_id.to_string()))
    }

    async fn revoke_group_access_token(&self, token_id: i64, group_id: &str) -> Result<()> {
        self.platform
            .revoke(Call::RevokeGroup(token_id, group_id.to_string()))
    }

    async fn revoke_user_service_account_access_token(&self, token: &str) -> Result<()> {
        self.platform
            .revoke(Call::RevokeUserServiceAccount(token.to_string()))
    }

    async fn revoke_group_service_account_access_token(&self, token: &str) -> Result<()> {
        self.platform
            .revoke(Call::RevokeGroupServiceAccount(token.to_string()))
    }
}

pub struct FakeFactory {
    platform: Arc<Platform>,
    builds: AtomicUsize,
}

impl FakeFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ClientFactory for FakeFactory {
    fn build(&self, config: &ConfigEntry) -> Result<Arc<dyn CapabilityClient>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.platform
            .built_with
            .lock()
            .unwrap()
            .push(config.token.expose().to_string());
        Ok(Arc::new(FakeClient {
            platform: self.platform.clone(),
            token: config.token.expose().to_string(),
        }))
    }
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub platform: Arc<Platform>,
    pub factory: Arc<FakeFactory>,
    pub events: MemorySink,
    pub storage: MemoryStorage,
}

impl Harness {
    pub fn new() -> Self {
        let platform = Arc::new(Platform::default());
        let factory = Arc::new(FakeFactory {
            platform: platform.clone(),
            builds: AtomicUsize::new(0),
        });
        let events = MemorySink::new();
        let backend = Backend::new(factory.clone())
            .unwrap()
            .with_events(Arc::new(events.clone()));
        Self {
            backend: Arc::new(backend),
            platform,
            factory,
            events,
            storage: MemoryStorage::new(),
        }
    }

    pub fn req(&self) -> Request {
        Request::new(Arc::new(self.storage.clone()))
    }

    pub fn revoke_req(&self, data: serde_json::Value) -> Request {
        self.req().with_secret(lease(data))
    }

    /// Store a configuration directly, bypassing the backend.
    pub async fn seed(&self, name: &str, expires_in: Option<chrono::Duration>, auto_rotate: bool) {
        let now = Utc::now();
        let config = ConfigEntry {
            name: name.into(),
            base_url: "https://gitlab.example.com".into(),
            platform: PlatformType::SelfManaged,
            token: AccessToken::new("glpat-admin-original"),
            token_id: 1,
            scopes: vec!["api".into()],
            token_created_at: Some(now - chrono::Duration::days(30)),
            token_expires_at: expires_in.map(|d| now + d),
            auto_rotate_token: auto_rotate,
            auto_rotate_before: Duration::from_secs(48 * 3600),
        };
        save_config(&self.storage, &config).await.unwrap();
    }

    pub async fn stored(&self, name: &str) -> Option<ConfigEntry> {
        glsecrets::store::config::load_config(&self.storage, name)
            .await
            .unwrap()
    }
}

pub fn lease(data: serde_json::Value) -> LeasedSecret {
    LeasedSecret::new("lease-1", data.as_object().cloned().unwrap())
}
