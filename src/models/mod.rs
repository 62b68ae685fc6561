// src/models/mod.rs

//! Domain models for discovery and polling.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod auth_config;
mod body;
mod config;
mod credentials;
mod profile;
mod signal;

// Re-export all public types
pub use auth_config::{
    AuthConfig, BasicHeaderConfig, FormConfig, FormVariant, HmacAlgorithm, HnapConfig,
    PasswordEncoding, StrategyKind, SuccessCheck, UrlTokenConfig,
};
pub use body::{PollData, RawBody};
pub use config::{
    CircuitConfig, Config, DiscoveryConfig, DiscoveryHints, HttpConfig, TargetConfig,
};
pub use credentials::Credentials;
pub use profile::{CandidateMatch, DeviceProfile};
pub use signal::{DiscoverySignal, SignalKind};
