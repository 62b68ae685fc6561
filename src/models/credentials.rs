// src/models/credentials.rs

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Username and password supplied by the caller for one call.
///
/// Never serialized and never stored in an `AuthConfig` or `Session`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read credentials from two environment variables.
    pub fn from_env(username_var: &str, password_var: &str) -> Option<Self> {
        let username = std::env::var(username_var).ok()?;
        let password = std::env::var(password_var).unwrap_or_default();
        Some(Self::new(username, password))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `user:pass`, base64 encoded.
    pub fn encoded_pair(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }

    /// Value for an `Authorization` header.
    pub fn basic_header_value(&self) -> String {
        format!("Basic {}", self.encoded_pair())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
