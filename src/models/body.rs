// src/models/body.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One fetched resource, passed untouched to content extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawBody {
    /// Path or HNAP action the body came from
    pub resource: String,
    pub status: u16,
    pub body: String,
}

impl RawBody {
    pub fn new(resource: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            status,
            body: body.into(),
        }
    }
}

/// Everything fetched in one successful poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PollData {
    pub bodies: Vec<RawBody>,
    pub fetched_at: DateTime<Utc>,
}

impl PollData {
    pub fn new(bodies: Vec<RawBody>) -> Self {
        Self {
            bodies,
            fetched_at: Utc::now(),
        }
    }

    /// First fetched body.
    pub fn primary(&self) -> Option<&RawBody> {
        self.bodies.first()
    }

    /// Body for a given resource.
    pub fn body(&self, resource: &str) -> Option<&str> {
        self.bodies
            .iter()
            .find(|b| b.resource == resource)
            .map(|b| b.body.as_str())
    }
}
