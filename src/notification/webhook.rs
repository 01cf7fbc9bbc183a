use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use super::{Event, EventSink};

// ── Webhook Payload ───────────────────────────────────────────

/// JSON body POSTed to each webhook URL.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// `<prefix>/<event name>`, e.g. "gitlab/token-revoke".
    pub event_type: String,
    /// RFC 3339 timestamp of when the event occurred.
    pub timestamp: String,
    pub attributes: std::collections::BTreeMap<String, String>,
}

impl WebhookEvent {
    pub fn from_event(prefix: &str, event: &Event) -> Self {
        let event_type = if prefix.is_empty() {
            event.name.clone()
        } else {
            format!("{}/{}", prefix, event.name)
        };
        Self {
            event_type,
            timestamp: event.timestamp.to_rfc3339(),
            attributes: event.attributes.clone(),
        }
    }
}

// ── HMAC Signing ─────────────────────────────────────────────

/// HMAC-SHA256 of `payload` keyed by `secret`, as "sha256=<hex>".
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid hmac key: {}", e))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

// ── Webhook Sink ──────────────────────────────────────────────

/// Delivers events to one or more webhook URLs.
///
/// Delivery runs on a spawned task; retries with back-off happen there and
/// never delay the operation that emitted the event.
#[derive(Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    urls: Arc<Vec<String>>,
    signing_secret: Option<Arc<str>>,
    prefix: Arc<str>,
    backoff: Arc<Vec<Duration>>,
}

impl WebhookSink {
    pub fn new(urls: Vec<String>, signing_secret: Option<String>, prefix: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("glsecrets-webhook/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            urls: Arc::new(urls),
            signing_secret: signing_secret.map(Arc::from),
            prefix: Arc::from(prefix),
            backoff: Arc::new(vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(25),
            ]),
        })
    }

    /// Replace the retry schedule. The first entry is the delay before the first attempt.
    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Send one event to one URL, retrying per the back-off schedule.
    pub async fn send(&self, url: &str, event: &WebhookEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let delivery_id = uuid::Uuid::new_v4().to_string();
        let signature = match self.signing_secret.as_deref() {
            Some(secret) => Some(hmac_sha256_hex(secret, &payload)?),
            None => None,
        };

        for (attempt, delay) in self.backoff.iter().enumerate() {
            if !delay.is_zero() {
                debug!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    event_type = %event.event_type,
                    "retrying webhook delivery"
                );
                tokio::time::sleep(*delay).await;
            }

            let mut req = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-glsecrets-delivery-id", &delivery_id)
                .header("x-glsecrets-event", &event.event_type);
            if let Some(ref sig) = signature {
                req = req.header("x-glsecrets-signature", sig.as_str());
            }

            match req.body(payload.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        "webhook delivered"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        status = %resp.status(),
                        "webhook delivery failed (non-2xx)"
                    );
                }
                Err(e) => {
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        error = %e,
                        "webhook request error"
                    );
                }
            }
        }

        Err(anyhow::anyhow!(
            "webhook delivery failed after {} attempts: {}",
            self.backoff.len(),
            url
        ))
    }
}

impl EventSink for WebhookSink {
    fn emit(&self, event: Event) {
        if self.urls.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(event = %event.name, "no async runtime, dropping webhook event");
            return;
        };

        let sink = self.clone();
        let payload = WebhookEvent::from_event(&self.prefix, &event);
        handle.spawn(async move {
            for url in sink.urls.iter() {
                if let Err(e) = sink.send(url, &payload).await {
                    warn!(url, error = %e, "webhook dispatch ultimately failed");
                }
            }
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────
