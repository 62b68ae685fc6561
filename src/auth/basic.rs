use async_trait::async_trait;

use crate::auth::{AuthStrategy, LoginOutcome, Session, fetch_paths, require_credentials};
use crate::error::{AppError, AuthFailureKind, Result};
use crate::models::{AuthConfig, Credentials, RawBody, StrategyKind};
use crate::services::login_page::looks_like_login_page;
use crate::utils::http::DeviceClient;

/// HTTP `Authorization: Basic` on every request.
///
/// There is no handshake, so bad credentials only show up as a 401 on the
/// data fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicHeaderAuth;

#[async_trait]
impl AuthStrategy for BasicHeaderAuth {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BasicHeader
    }

    async fn login(
        &self,
        _client: &DeviceClient,
        session: &mut Session,
        credentials: Option<&Credentials>,
        _config: &AuthConfig,
    ) -> Result<LoginOutcome> {
        let credentials = match require_credentials(credentials) {
            Ok(credentials) => credentials,
            Err(outcome) => return Ok(outcome),
        };
        session.set_authorization(credentials.basic_header_value());
        session.mark_authenticated();
        Ok(LoginOutcome::success(None))
    }

    async fn fetch(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        _config: &AuthConfig,
        resources: &[String],
    ) -> Result<Vec<RawBody>> {
        let bodies = fetch_paths(client, session, resources, |path| Ok(path.to_string())).await?;
        if let Some(denied) = bodies.iter().find(|raw| raw.status == 401) {
            log::warn!("{} answered 401 to basic credentials", denied.resource);
            return Err(AppError::auth(AuthFailureKind::InvalidCredentials));
        }
        Ok(bodies)
    }

    fn looks_expired(&self, body: &str, _config: &AuthConfig) -> bool {
        looks_like_login_page(body)
    }

    fn describe(&self, config: &AuthConfig) -> String {
        match config {
            AuthConfig::BasicHeader(basic) => match &basic.realm {
                Some(realm) => format!("HTTP basic authentication (realm \"{realm}\")"),
                None => "HTTP basic authentication".to_string(),
            },
            other => format!("HTTP basic authentication (unexpected {} config)", other.kind()),
        }
    }
}
