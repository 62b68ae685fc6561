//! Durable per-target records.
//!
//! One JSON record per target id holding the discovered `AuthConfig`, the
//! resources to poll and the extractor selection. Records never hold
//! credentials.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! └── targets/
//!     ├── basement-modem.json
//!     └── office-modem.json
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::AuthConfig;
use crate::pipeline::ExtractorSelection;
use crate::services::Discovery;

// Re-export for convenience
pub use local::LocalStore;

/// What is remembered about one target between runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTarget {
    pub id: String,
    pub address: String,
    pub auth: AuthConfig,
    pub data_paths: Vec<String>,
    pub extractor: ExtractorSelection,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// On-disk shape. `auth` is parsed separately so unknown strategy tags
/// fail closed.
#[derive(Deserialize)]
struct RawTarget {
    id: String,
    address: String,
    auth: Value,
    #[serde(default)]
    data_paths: Vec<String>,
    #[serde(default)]
    extractor: ExtractorSelection,
    discovered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredTarget {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        auth: AuthConfig,
        data_paths: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            address: address.into(),
            auth,
            data_paths,
            extractor: ExtractorSelection::default(),
            discovered_at: now,
            updated_at: now,
        }
    }

    pub fn from_discovery(
        id: impl Into<String>,
        address: impl Into<String>,
        discovery: &Discovery,
    ) -> Self {
        Self::new(
            id,
            address,
            discovery.config.clone(),
            discovery.data_paths.clone(),
        )
    }

    /// Record a changed config (e.g. a newly negotiated HNAP hash).
    /// Returns true if anything changed.
    pub fn update_auth(&mut self, auth: &AuthConfig) -> bool {
        if &self.auth == auth {
            return false;
        }
        self.auth = auth.clone();
        self.updated_at = Utc::now();
        true
    }

    pub fn update_extractor(&mut self, selection: ExtractorSelection) -> bool {
        if self.extractor == selection {
            return false;
        }
        self.extractor = selection;
        self.updated_at = Utc::now();
        true
    }

    /// Parse a persisted record.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawTarget = serde_json::from_slice(bytes)?;
        Ok(Self {
            id: raw.id,
            address: raw.address,
            auth: AuthConfig::from_value(raw.auth)?,
            data_paths: raw.data_paths,
            extractor: raw.extractor,
            discovered_at: raw.discovered_at,
            updated_at: raw.updated_at,
        })
    }
}

/// Target ids double as file names.
pub fn validate_target_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!("invalid target id '{id}'")))
    }
}

/// Trait for target record backends.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<StoredTarget>>;

    async fn save(&self, target: &StoredTarget) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<bool>;

    /// Ids of every stored target, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HmacAlgorithm, HnapConfig};

    #[test]
    fn test_unknown_strategy_fails_closed() {
        let json = br#"{
            "id": "modem",
            "address": "192.168.100.1",
            "auth": {"strategy": "kerberos", "realm": "x"},
            "discovered_at": "2026-10-19T00:00:00Z",
            "updated_at": "2026-10-19T00:00:00Z"
        }"#;
        let err = StoredTarget::from_json(json).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedStrategy(tag) if tag == "kerberos"));
    }

    #[test]
    fn test_update_auth_reports_change() {
        let mut target = StoredTarget::new(
            "modem",
            "192.168.100.1",
            AuthConfig::Hnap(HnapConfig::default()),
            vec![],
        );
        let mut negotiated = target.auth.clone();
        negotiated.record_negotiated_algorithm(HmacAlgorithm::Sha256);

        assert!(target.update_auth(&negotiated));
        assert!(!target.update_auth(&negotiated));
        assert_eq!(target.auth.negotiated_algorithm(), Some(HmacAlgorithm::Sha256));
    }

    #[test]
    fn test_validate_target_id() {
        assert!(validate_target_id("office-modem_2").is_ok());
        assert!(validate_target_id("").is_err());
        assert!(validate_target_id("../etc/passwd").is_err());
        assert!(validate_target_id(".hidden").is_err());
    }
}
