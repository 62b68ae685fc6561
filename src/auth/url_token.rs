// src/auth/url_token.rs

//! Embedded-token session.
//!
//! Login is a GET of `<login_path>?<login_prefix><base64(user:pass)>`. The
//! device answers with a session cookie; every later request carries
//! `?<token_prefix><cookie value>` in its query.

use async_trait::async_trait;

use crate::auth::{AuthStrategy, LoginOutcome, Session, fetch_paths, mismatched, require_credentials};
use crate::error::{AppError, AuthFailureKind, Result};
use crate::models::{AuthConfig, Credentials, RawBody, StrategyKind, UrlTokenConfig};
use crate::services::login_page::looks_like_login_page;
use crate::utils::http::{DeviceClient, HttpRequest};

#[derive(Debug, Clone, Copy, Default)]
pub struct UrlTokenAuth;

/// Some firmware returns the token as the whole response body instead of
/// (or as well as) the cookie.
fn token_from_body(body: &str) -> Option<String> {
    let body = body.trim();
    let plausible = !body.is_empty()
        && body.len() <= 128
        && body.chars().all(|c| c.is_ascii_alphanumeric() || "-_=+/.".contains(c));
    plausible.then(|| body.to_string())
}

fn with_query(path: &str, query: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{query}")
}

fn token_config(config: &AuthConfig) -> Result<&UrlTokenConfig> {
    match config {
        AuthConfig::UrlToken(token) => Ok(token),
        other => Err(mismatched(StrategyKind::UrlToken, other)),
    }
}

#[async_trait]
impl AuthStrategy for UrlTokenAuth {
    fn kind(&self) -> StrategyKind {
        StrategyKind::UrlToken
    }

    async fn login(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        credentials: Option<&Credentials>,
        config: &AuthConfig,
    ) -> Result<LoginOutcome> {
        let token = token_config(config)?;
        let credentials = match require_credentials(credentials) {
            Ok(credentials) => credentials,
            Err(outcome) => return Ok(outcome),
        };

        session.cookies_mut().set(&token.cookie_name, "");
        let path = with_query(
            &token.login_path,
            &format!("{}{}", token.login_prefix, credentials.encoded_pair()),
        );
        let mut request = HttpRequest::get(client.url(&path)?);
        if token.send_basic_header {
            request = request.header("Authorization", credentials.basic_header_value());
        }
        let response = session.send(client, request).await?;

        if matches!(response.status, 401 | 403) {
            return Ok(LoginOutcome::rejected(
                AuthFailureKind::InvalidCredentials,
                Some(response.body),
            ));
        }
        if !response.is_success() {
            return Err(AppError::protocol(format!(
                "token login returned HTTP {}",
                response.status
            )));
        }

        let issued = session
            .cookies()
            .get(&token.cookie_name)
            .map(str::to_string)
            .or_else(|| token_from_body(&response.body));
        match issued {
            Some(value) => {
                session.set_url_token(value);
                session.mark_authenticated();
                log::info!("Token login accepted at {}", token.login_path);
                Ok(LoginOutcome::success(Some(response.body)))
            }
            None => {
                log::info!("Token login at {} issued no token", token.login_path);
                Ok(LoginOutcome::rejected(
                    AuthFailureKind::InvalidCredentials,
                    Some(response.body),
                ))
            }
        }
    }

    async fn fetch(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        config: &AuthConfig,
        resources: &[String],
    ) -> Result<Vec<RawBody>> {
        let token = token_config(config)?;
        let value = session
            .url_token()
            .map(str::to_string)
            .ok_or(AppError::SessionExpired)?;
        let query = format!("{}{}", token.token_prefix, value);
        fetch_paths(client, session, resources, |path| Ok(with_query(path, &query))).await
    }

    fn looks_expired(&self, body: &str, _config: &AuthConfig) -> bool {
        looks_like_login_page(body)
    }

    fn session_still_valid(&self, session: &Session) -> bool {
        session.is_authenticated() && session.url_token().is_some()
    }

    fn describe(&self, config: &AuthConfig) -> String {
        match config {
            AuthConfig::UrlToken(token) => format!(
                "URL token session via {} (cookie '{}', token prefix '{}')",
                token.login_path, token.cookie_name, token.token_prefix
            ),
            other => format!("URL token session (unexpected {} config)", other.kind()),
        }
    }
}
