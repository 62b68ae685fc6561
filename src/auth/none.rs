use async_trait::async_trait;

use crate::auth::{AuthStrategy, LoginOutcome, Session};
use crate::error::Result;
use crate::models::{AuthConfig, Credentials, RawBody, StrategyKind};
use crate::utils::http::DeviceClient;

/// Targets that serve data anonymously.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthStrategy for NoAuth {
    fn kind(&self) -> StrategyKind {
        StrategyKind::None
    }

    async fn login(
        &self,
        _client: &DeviceClient,
        session: &mut Session,
        _credentials: Option<&Credentials>,
        _config: &AuthConfig,
    ) -> Result<LoginOutcome> {
        session.mark_authenticated();
        Ok(LoginOutcome::success(None))
    }

    fn looks_expired(&self, _body: &str, _config: &AuthConfig) -> bool {
        false
    }

    // There is no session to lose; an error status is reported as-is.
    fn is_expired(&self, _raw: &RawBody, _config: &AuthConfig) -> bool {
        false
    }

    fn describe(&self, _config: &AuthConfig) -> String {
        "no authentication".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::fixtures::{DATA_PAGE, LOGIN_PAGE};
    use crate::utils::http::testing::{ScriptedTransport, client};

    #[tokio::test]
    async fn test_login_is_trivial() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(transport.clone());
        let mut session = Session::new();

        let outcome = NoAuth
            .login(&client, &mut session, None, &AuthConfig::None)
            .await
            .unwrap();

        assert!(outcome.ok);
        assert!(NoAuth.session_still_valid(&session));
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_never_expires() {
        assert!(!NoAuth.looks_expired(DATA_PAGE, &AuthConfig::None));
        assert!(!NoAuth.looks_expired(LOGIN_PAGE, &AuthConfig::None));
        assert!(!NoAuth.is_expired(&RawBody::new("/", 401, ""), &AuthConfig::None));
    }
}
