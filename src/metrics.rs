//! Prometheus counters for rotations and revocations.
//!
//! Each backend owns its own registry so several backends (and tests) can
//! coexist in one process. Rendered as text by `GET /metrics`.

use prometheus::{opts, CounterVec, Encoder, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    rotations_total: CounterVec,
    revocations_total: CounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let rotations_total = CounterVec::new(
            opts!(
                "glsecrets_rotations_total",
                "Administrative token rotations by outcome"
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(rotations_total.clone()))?;

        let revocations_total = CounterVec::new(
            opts!(
                "glsecrets_revocations_total",
                "Derived token revocations by token type and outcome"
            ),
            &["token_type", "outcome"],
        )?;
        registry.register(Box::new(revocations_total.clone()))?;

        Ok(Self {
            registry,
            rotations_total,
            revocations_total,
        })
    }

    /// outcome: "rotated", "not_configured", "error".
    pub fn record_rotation(&self, outcome: &str) {
        self.rotations_total.with_label_values(&[outcome]).inc();
    }

    /// outcome: "revoked", "already_gone", "skipped", "error".
    pub fn record_revocation(&self, token_type: &str, outcome: &str) {
        self.revocations_total
            .with_label_values(&[token_type, outcome])
            .inc();
    }

    pub fn rotations(&self, outcome: &str) -> u64 {
        self.rotations_total.with_label_values(&[outcome]).get() as u64
    }

    pub fn revocations(&self, token_type: &str, outcome: &str) -> u64 {
        self.revocations_total
            .with_label_values(&[token_type, outcome])
            .get() as u64
    }

    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
