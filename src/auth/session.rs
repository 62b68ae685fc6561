// src/auth/session.rs

//! Authenticated context for one target.

use std::fmt;

use crate::error::Result;
use crate::hnap::HnapKeys;
use crate::utils::cookies::CookieJar;
use crate::utils::http::{DeviceClient, HttpRequest, HttpResponse};

/// Opaque per-strategy session state.
///
/// Only the strategy that created a session reads or writes its fields;
/// the orchestrator just carries it between calls.
#[derive(Clone, Default)]
pub struct Session {
    cookies: CookieJar,
    authorization: Option<String>,
    hnap: Option<HnapKeys>,
    url_token: Option<String>,
    authenticated: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// `Authorization` header attached to every request on this session.
    ///
    /// For basic auth this is `Basic base64(user:pass)`, reversible
    /// credential material kept for the session's lifetime. It is masked in
    /// `Debug` output and dropped by `reset`.
    pub fn set_authorization(&mut self, value: impl Into<String>) {
        self.authorization = Some(value.into());
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn set_hnap_keys(&mut self, keys: HnapKeys) {
        self.hnap = Some(keys);
    }

    pub fn hnap_keys(&self) -> Option<&HnapKeys> {
        self.hnap.as_ref()
    }

    pub fn set_url_token(&mut self, token: impl Into<String>) {
        self.url_token = Some(token.into());
    }

    pub fn url_token(&self) -> Option<&str> {
        self.url_token.as_deref()
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Drop everything, including cookies.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Send `request` with this session's header and cookies, collecting
    /// any cookies the device sets.
    pub async fn send(&mut self, client: &DeviceClient, request: HttpRequest) -> Result<HttpResponse> {
        let request = match &self.authorization {
            Some(value) if request.header_value("Authorization").is_none() => {
                request.header("Authorization", value.clone())
            }
            _ => request,
        };
        client.execute(request, &mut self.cookies).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies)
            .field("authorization", &self.authorization.as_ref().map(|_| "***"))
            .field("hnap", &self.hnap)
            .field("url_token", &self.url_token.as_ref().map(|_| "***"))
            .field("authenticated", &self.authenticated)
            .finish()
    }
}
