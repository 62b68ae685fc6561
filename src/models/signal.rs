// src/models/signal.rs

//! Discovery evidence.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::redact::redact_text;

/// What a piece of evidence speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Interface style: html page, HNAP JSON, redirect.
    Paradigm,
    /// Authentication family the target appears to use.
    AuthKind,
    /// A known model name or marker was seen.
    ModelHint,
    /// Structure of a login form (action, field names).
    FormEvidence,
    /// Raw network observation (status codes, redirects).
    Network,
    /// Outcome of a login or re-fetch check.
    Validation,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Paradigm => "paradigm",
            SignalKind::AuthKind => "auth-kind",
            SignalKind::ModelHint => "model-hint",
            SignalKind::FormEvidence => "form-evidence",
            SignalKind::Network => "network",
            SignalKind::Validation => "validation",
        }
    }
}

/// A single immutable observation made during discovery.
///
/// Values are redacted on construction so a signal list can be logged or
/// shown to a user as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySignal {
    kind: SignalKind,
    value: String,
    confidence: f32,
    source: String,
}

impl DiscoverySignal {
    pub fn new(
        kind: SignalKind,
        value: impl AsRef<str>,
        confidence: f32,
        source: impl AsRef<str>,
    ) -> Self {
        Self {
            kind,
            value: redact_text(value.as_ref()),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            source: redact_text(source.as_ref()),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is(&self, kind: SignalKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }
}

impl fmt::Display for DiscoverySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({:.2}, from {})",
            self.kind.as_str(),
            self.value,
            self.confidence,
            self.source
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let high = DiscoverySignal::new(SignalKind::AuthKind, "form", 3.0, "probe");
        assert_eq!(high.confidence(), 1.0);
        let nan = DiscoverySignal::new(SignalKind::AuthKind, "form", f32::NAN, "probe");
        assert_eq!(nan.confidence(), 0.0);
    }

    #[test]
    fn test_values_are_redacted() {
        let signal = DiscoverySignal::new(
            SignalKind::Network,
            "GET /status.html?login_YWRtaW46cGFzcw==",
            0.5,
            "POST /goform/login password=hunter2",
        );
        assert!(!signal.value().contains("YWRtaW46"));
        assert!(!signal.source().contains("hunter2"));
    }
}
