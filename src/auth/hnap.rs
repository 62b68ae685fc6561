use async_trait::async_trait;

use crate::auth::{AuthStrategy, LoginOutcome, Session, mismatched, require_credentials};
use crate::error::{AppError, Result};
use crate::hnap::HnapBuilder;
use crate::hnap::constants::{MULTIPLE_ACTION, SESSION_EXPIRED_MARKER};
use crate::models::{AuthConfig, Credentials, RawBody, StrategyKind};
use crate::services::login_page::looks_like_login_page;
use crate::utils::http::DeviceClient;

/// HNAP challenge-response session. The handshake itself lives in
/// `HnapBuilder`, shared with discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct HnapAuth;

#[async_trait]
impl AuthStrategy for HnapAuth {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hnap
    }

    async fn login(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        credentials: Option<&Credentials>,
        config: &AuthConfig,
    ) -> Result<LoginOutcome> {
        let AuthConfig::Hnap(hnap) = config else {
            return Err(mismatched(StrategyKind::Hnap, config));
        };
        let credentials = match require_credentials(credentials) {
            Ok(credentials) => credentials,
            Err(outcome) => return Ok(outcome),
        };

        let builder = HnapBuilder::from_config(hnap);
        let order = hnap.algorithm_order();
        match builder
            .login(client, session.cookies_mut(), credentials, &order)
            .await
        {
            Ok(login) => {
                session.set_hnap_keys(login.keys);
                session.mark_authenticated();
                Ok(LoginOutcome::success(Some(login.body)).with_negotiated(login.algorithm))
            }
            Err(AppError::Authentication { kind }) => Ok(LoginOutcome::rejected(kind, None)),
            Err(error) => Err(error),
        }
    }

    /// One batched call for every configured action.
    async fn fetch(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        config: &AuthConfig,
        resources: &[String],
    ) -> Result<Vec<RawBody>> {
        let AuthConfig::Hnap(hnap) = config else {
            return Err(mismatched(StrategyKind::Hnap, config));
        };
        let actions: &[String] = if hnap.data_actions.is_empty() {
            resources
        } else {
            &hnap.data_actions
        };
        if actions.is_empty() {
            return Err(AppError::config("HNAP target has no data actions to request"));
        }
        let keys = session
            .hnap_keys()
            .cloned()
            .ok_or(AppError::SessionExpired)?;

        let response = HnapBuilder::from_config(hnap)
            .call_batch(client, session.cookies_mut(), &keys, actions)
            .await?;
        Ok(vec![RawBody::new(MULTIPLE_ACTION, response.status, response.body)])
    }

    fn looks_expired(&self, body: &str, _config: &AuthConfig) -> bool {
        body.contains(SESSION_EXPIRED_MARKER) || looks_like_login_page(body)
    }

    fn session_still_valid(&self, session: &Session) -> bool {
        session.is_authenticated() && session.hnap_keys().is_some()
    }

    fn describe(&self, config: &AuthConfig) -> String {
        match config {
            AuthConfig::Hnap(hnap) => format!(
                "HNAP challenge-response at {} ({})",
                hnap.endpoint,
                hnap.negotiated_algorithm
                    .map(|algorithm| format!("negotiated {algorithm}"))
                    .unwrap_or_else(|| format!("primary {}", hnap.primary_algorithm))
            ),
            other => format!("HNAP challenge-response (unexpected {} config)", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::fixtures::LOGIN_PAGE;
    use crate::error::AuthFailureKind;
    use crate::hnap::fixtures::{BATCH, CHALLENGE, LOGIN_FAILED, LOGIN_LOCKUP, LOGIN_OK, UN_AUTH};
    use crate::models::{HmacAlgorithm, HnapConfig};
    use crate::utils::http::Method;
    use crate::utils::http::testing::{Canned, ScriptedTransport, client};

    fn config() -> AuthConfig {
        AuthConfig::Hnap(HnapConfig {
            data_actions: vec![
                "GetCustomerStatusDownstreamChannelInfo".into(),
                "GetCustomerStatusConnectionInfo".into(),
            ],
            ..HnapConfig::default()
        })
    }

    fn transport(replies: &[&str]) -> Arc<ScriptedTransport> {
        let transport = ScriptedTransport::new();
        for reply in replies {
            transport.push(Method::Post, "/HNAP1/", Canned::ok(*reply));
        }
        Arc::new(transport)
    }

    #[tokio::test]
    async fn test_login_then_batched_fetch() {
        let transport = transport(&[CHALLENGE, LOGIN_OK, BATCH]);
        let client = client(transport.clone());
        let mut session = Session::new();
        let creds = Credentials::new("admin", "password");

        let outcome = HnapAuth
            .login(&client, &mut session, Some(&creds), &config())
            .await
            .unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.negotiated, Some(HmacAlgorithm::Md5));
        assert!(HnapAuth.session_still_valid(&session));

        let bodies = HnapAuth
            .fetch(&client, &mut session, &config(), &[])
            .await
            .unwrap();
        assert_eq!(bodies.len(), 1);
        assert!(!HnapAuth.is_expired(&bodies[0], &config()));

        let calls = transport.calls();
        assert_eq!(
            calls[2].header("SOAPAction"),
            Some("\"http://purenetworks.com/HNAP1/GetMultipleHNAPs\"")
        );
        assert!(calls[2].header("Cookie").unwrap().contains("uid=COOKIE42"));
    }

    #[tokio::test]
    async fn test_lockout_is_reported_not_retried() {
        let transport = transport(&[CHALLENGE, LOGIN_LOCKUP]);
        let client = client(transport.clone());
        let mut session = Session::new();
        let creds = Credentials::new("admin", "password");

        let outcome = HnapAuth
            .login(&client, &mut session, Some(&creds), &config())
            .await
            .unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.failure, Some(AuthFailureKind::LockedOut));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_on_both_algorithms() {
        let transport = transport(&[CHALLENGE, LOGIN_FAILED, CHALLENGE, LOGIN_FAILED]);
        let client = client(transport.clone());
        let mut session = Session::new();
        let creds = Credentials::new("admin", "wrong");

        let outcome = HnapAuth
            .login(&client, &mut session, Some(&creds), &config())
            .await
            .unwrap();
        assert_eq!(outcome.failure, Some(AuthFailureKind::InvalidCredentials));
        assert!(!HnapAuth.session_still_valid(&session));
    }

    #[tokio::test]
    async fn test_fetch_without_keys_is_expired() {
        let transport = transport(&[BATCH]);
        let client = client(transport.clone());
        let mut session = Session::new();

        let err = HnapAuth
            .fetch(&client, &mut session, &config(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_expiry_markers() {
        assert!(HnapAuth.looks_expired(UN_AUTH, &config()));
        assert!(HnapAuth.looks_expired(LOGIN_PAGE, &config()));
        assert!(!HnapAuth.looks_expired(BATCH, &config()));
    }
}
