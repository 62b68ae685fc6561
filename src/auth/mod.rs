// src/auth/mod.rs

//! Authentication strategies.
//!
//! One `AuthStrategy` per authentication family. Strategies are stateless:
//! the replayable parameters live in `AuthConfig`, the live context in
//! `Session`, and credentials arrive per call.

mod basic;
mod form;
mod hnap;
mod none;
mod session;
mod url_token;

use std::fmt;

use async_trait::async_trait;

use crate::error::{AppError, AuthFailureKind, Result};
use crate::models::{AuthConfig, Credentials, HmacAlgorithm, RawBody, StrategyKind};
use crate::utils::http::{DeviceClient, HttpRequest};

pub use basic::BasicHeaderAuth;
pub use form::FormAuth;
pub use hnap::HnapAuth;
pub use none::NoAuth;
pub use session::Session;
pub use url_token::UrlTokenAuth;

/// Result of one login attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOutcome {
    pub ok: bool,
    /// Body of the final login response, when there was one.
    pub body: Option<String>,
    /// Why the device refused, when `ok` is false.
    pub failure: Option<AuthFailureKind>,
    /// HNAP hash that completed the handshake.
    pub negotiated: Option<HmacAlgorithm>,
}

impl LoginOutcome {
    pub fn success(body: Option<String>) -> Self {
        Self {
            ok: true,
            body,
            ..Self::default()
        }
    }

    pub fn rejected(kind: AuthFailureKind, body: Option<String>) -> Self {
        Self {
            ok: false,
            body,
            failure: Some(kind),
            negotiated: None,
        }
    }

    pub fn with_negotiated(mut self, algorithm: HmacAlgorithm) -> Self {
        self.negotiated = Some(algorithm);
        self
    }

    /// `Ok(())` on success, the matching authentication error otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.ok {
            return Ok(());
        }
        Err(AppError::auth(
            self.failure.unwrap_or(AuthFailureKind::InvalidCredentials),
        ))
    }
}

/// One authentication family.
#[async_trait]
pub trait AuthStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Establish a session. Device-reported refusals come back as a
    /// rejected outcome; transport failures as errors.
    async fn login(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        credentials: Option<&Credentials>,
        config: &AuthConfig,
    ) -> Result<LoginOutcome>;

    /// Fetch the data resources through the session.
    async fn fetch(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        _config: &AuthConfig,
        resources: &[String],
    ) -> Result<Vec<RawBody>> {
        fetch_paths(client, session, resources, |path| Ok(path.to_string())).await
    }

    /// Whether a fetched body is a sign the session is gone.
    fn looks_expired(&self, body: &str, config: &AuthConfig) -> bool;

    /// Whether a fetched response means the session is gone.
    fn is_expired(&self, raw: &RawBody, config: &AuthConfig) -> bool {
        raw.status == 401 || self.looks_expired(&raw.body, config)
    }

    /// Whether the session can be used without logging in first.
    fn session_still_valid(&self, session: &Session) -> bool {
        session.is_authenticated()
    }

    /// One line for diagnostics. Never includes secrets.
    fn describe(&self, config: &AuthConfig) -> String;
}

/// GET each resource through the session, mapping paths with `target`.
pub(crate) async fn fetch_paths<F>(
    client: &DeviceClient,
    session: &mut Session,
    resources: &[String],
    target: F,
) -> Result<Vec<RawBody>>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    let mut bodies = Vec::with_capacity(resources.len());
    for resource in resources {
        client.ensure_active()?;
        let url = client.url(&target(resource)?)?;
        let response = session.send(client, HttpRequest::get(url)).await?;
        bodies.push(RawBody::new(resource.clone(), response.status, response.body));
    }
    Ok(bodies)
}

pub(crate) fn require_credentials(
    credentials: Option<&Credentials>,
) -> std::result::Result<&Credentials, LoginOutcome> {
    credentials.ok_or_else(|| LoginOutcome::rejected(AuthFailureKind::MissingCredentials, None))
}

pub(crate) fn mismatched(expected: StrategyKind, config: &AuthConfig) -> AppError {
    AppError::unexpected(
        "auth strategy dispatch",
        format!("{expected} strategy given a {} config", config.kind()),
    )
}

type Constructor = fn() -> Box<dyn AuthStrategy>;

fn build_none() -> Box<dyn AuthStrategy> {
    Box::new(NoAuth)
}

fn build_basic() -> Box<dyn AuthStrategy> {
    Box::new(BasicHeaderAuth)
}

fn build_form() -> Box<dyn AuthStrategy> {
    Box::new(FormAuth)
}

fn build_hnap() -> Box<dyn AuthStrategy> {
    Box::new(HnapAuth)
}

fn build_url_token() -> Box<dyn AuthStrategy> {
    Box::new(UrlTokenAuth)
}

/// Strategy tag to constructor. Dispatch is a lookup.
static REGISTRY: [(StrategyKind, Constructor); 5] = [
    (StrategyKind::None, build_none),
    (StrategyKind::BasicHeader, build_basic),
    (StrategyKind::Form, build_form),
    (StrategyKind::Hnap, build_hnap),
    (StrategyKind::UrlToken, build_url_token),
];

pub fn strategy_for(kind: StrategyKind) -> Box<dyn AuthStrategy> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == kind)
        .map(|(_, build)| build())
        .unwrap_or_else(build_none)
}

pub fn strategy_for_config(config: &AuthConfig) -> Box<dyn AuthStrategy> {
    strategy_for(config.kind())
}

/// Look up a strategy by its persisted tag.
pub fn strategy_for_tag(tag: &str) -> Result<Box<dyn AuthStrategy>> {
    StrategyKind::from_tag(tag)
        .map(strategy_for)
        .ok_or_else(|| AppError::UnsupportedStrategy(tag.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_kind() {
        for kind in StrategyKind::ALL {
            assert_eq!(strategy_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        let err = strategy_for_tag("kerberos").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedStrategy(tag) if tag == "kerberos"));
        assert_eq!(strategy_for_tag("hnap").unwrap().kind(), StrategyKind::Hnap);
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(LoginOutcome::success(None).into_result().is_ok());
        let err = LoginOutcome::rejected(AuthFailureKind::LockedOut, None)
            .into_result()
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthFailureKind::LockedOut));
    }

    #[test]
    fn test_every_strategy_flags_login_page() {
        let configs = [
            AuthConfig::BasicHeader(Default::default()),
            AuthConfig::Form(crate::models::FormConfig::new("/goform/login")),
            AuthConfig::Hnap(Default::default()),
            AuthConfig::UrlToken(Default::default()),
        ];
        for config in configs {
            let strategy = strategy_for_config(&config);
            assert!(
                strategy.looks_expired(fixtures::LOGIN_PAGE, &config),
                "{} should treat a login page as expired",
                strategy.kind()
            );
            assert!(!strategy.looks_expired(fixtures::DATA_PAGE, &config));
        }
    }
}
