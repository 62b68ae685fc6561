// src/models/profile.rs

//! Known device configurations and discovery-time candidate matches.

use serde::{Deserialize, Serialize};

use crate::models::AuthConfig;

/// A known device family: how to recognize it and how it usually
/// authenticates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Profile name for identification (e.g., "Arris SB8200")
    pub name: String,

    #[serde(default)]
    pub manufacturer: String,

    /// Page content substrings that identify the model
    #[serde(default)]
    pub detect_body_contains: Vec<String>,

    /// URL substrings (final URL after redirects) that identify the model
    #[serde(default)]
    pub detect_url_contains: Vec<String>,

    /// Authentication this family normally uses. Live evidence wins.
    pub auth: AuthConfig,

    /// Resources to poll once authenticated
    #[serde(default)]
    pub data_paths: Vec<String>,
}

impl DeviceProfile {
    /// Matching and mismatching markers for a page body and URL.
    pub fn match_markers(&self, url: &str, body_lower: &str) -> (Vec<String>, Vec<String>) {
        let mut matching = Vec::new();
        let mut mismatching = Vec::new();

        for marker in &self.detect_body_contains {
            if body_lower.contains(&marker.to_lowercase()) {
                matching.push(format!("body contains '{marker}'"));
            } else {
                mismatching.push(format!("body lacks '{marker}'"));
            }
        }
        for marker in &self.detect_url_contains {
            if url.contains(marker.as_str()) {
                matching.push(format!("url contains '{marker}'"));
            }
        }

        (matching, mismatching)
    }
}

/// A known profile scored against collected signals. Lives only for the
/// discovery call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub profile: DeviceProfile,
    pub score: f32,
    pub matching: Vec<String>,
    pub mismatching: Vec<String>,
}

impl CandidateMatch {
    pub fn auth(&self) -> &AuthConfig {
        &self.profile.auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_markers() {
        let profile = DeviceProfile {
            name: "Arris SB8200".into(),
            manufacturer: "Arris".into(),
            detect_body_contains: vec!["SB8200".into(), "ARRIS".into()],
            detect_url_contains: vec!["cmconnectionstatus".into()],
            auth: AuthConfig::None,
            data_paths: vec![],
        };

        let (matching, mismatching) = profile.match_markers(
            "http://192.168.100.1/cmconnectionstatus.html",
            "<title>sb8200</title>",
        );
        assert_eq!(matching.len(), 2);
        assert_eq!(mismatching.len(), 1);
    }
}
