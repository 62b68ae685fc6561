//! Service layer for discovery.
//!
//! This module contains the logic for:
//! - Login page inspection (`inspect`, `find_login_form`)
//! - Known-profile ranking (`CandidateMatcher`)
//! - Strategy discovery and validation (`DiscoveryEngine`)

pub mod candidates;
pub mod discovery;
pub mod login_page;

pub use candidates::CandidateMatcher;
pub use discovery::{Discovery, DiscoveryEngine, discover};
pub use login_page::{FormEvidence, PageEvidence, inspect, looks_like_login_page};
