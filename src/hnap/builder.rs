//! HNAP challenge-response builder.
//!
//! Builds and parses the JSON envelopes, derives the HMAC key material and
//! runs the two-phase login handshake. Discovery and the poll-time
//! strategy both go through `HnapBuilder`, so there is one handshake
//! implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use md5::Md5;
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::{AppError, AuthFailureKind, Result};
use crate::hnap::constants::{self, login, result};
use crate::hnap::delimited;
use crate::models::{Credentials, HmacAlgorithm, HnapConfig};
use crate::utils::cookies::CookieJar;
use crate::utils::http::{CONTENT_TYPE_JSON, DeviceClient, HttpRequest, HttpResponse};
use crate::utils::redact::redact_text;

type HmacMd5 = Hmac<Md5>;
type HmacSha256 = Hmac<Sha256>;

/// Upper-case hex HMAC of `message` under `key`.
pub fn hmac_hex(algorithm: HmacAlgorithm, key: &str, message: &str) -> Result<String> {
    let bytes = match algorithm {
        HmacAlgorithm::Md5 => {
            let mut mac = HmacMd5::new_from_slice(key.as_bytes())
                .map_err(|e| AppError::unexpected("hnap hmac-md5", e))?;
            mac.update(message.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(key.as_bytes())
                .map_err(|e| AppError::unexpected("hnap hmac-sha256", e))?;
            mac.update(message.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hex::encode_upper(bytes))
}

/// `HMAC(key = challenge, message = public_key + password)`.
pub fn derive_private_key(
    algorithm: HmacAlgorithm,
    challenge: &str,
    public_key: &str,
    password: &str,
) -> Result<String> {
    hmac_hex(algorithm, challenge, &format!("{public_key}{password}"))
}

/// `HMAC(key = private_key, message = challenge)`.
pub fn derive_login_password(
    algorithm: HmacAlgorithm,
    private_key: &str,
    challenge: &str,
) -> Result<String> {
    hmac_hex(algorithm, private_key, challenge)
}

/// Milliseconds since the epoch, reduced to the range devices accept.
pub fn timestamp_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        % constants::TIMESTAMP_MODULUS
}

fn wrap(action: &str, inner: Value) -> Value {
    let mut root = Map::new();
    root.insert(action.to_string(), inner);
    Value::Object(root)
}

/// Key material from a completed handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct HnapKeys {
    private_key: String,
    algorithm: HmacAlgorithm,
}

impl HnapKeys {
    pub fn new(private_key: impl Into<String>, algorithm: HmacAlgorithm) -> Self {
        Self {
            private_key: private_key.into(),
            algorithm,
        }
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for HnapKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnapKeys")
            .field("private_key", &"***")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Values returned by the challenge phase.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge: String,
    pub public_key: String,
    pub cookie: String,
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("challenge", &self.challenge)
            .field("public_key", &self.public_key)
            .field("cookie", &"***")
            .finish()
    }
}

/// Result code of the login-submit phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCode {
    Ok,
    Failed,
    Locked,
    RebootRequired,
    Other(String),
}

impl LoginCode {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            result::OK => LoginCode::Ok,
            result::FAILED => LoginCode::Failed,
            result::LOCKUP | result::LOCKED => LoginCode::Locked,
            result::REBOOT => LoginCode::RebootRequired,
            other => LoginCode::Other(other.to_string()),
        }
    }

    /// Authentication failure this code maps to, `None` for `Ok`.
    pub fn failure(&self) -> Option<AuthFailureKind> {
        match self {
            LoginCode::Ok => None,
            LoginCode::Failed | LoginCode::Other(_) => Some(AuthFailureKind::InvalidCredentials),
            LoginCode::Locked => Some(AuthFailureKind::LockedOut),
            LoginCode::RebootRequired => Some(AuthFailureKind::RebootRequired),
        }
    }
}

/// A successful login, with the hash that worked.
#[derive(Debug, Clone)]
pub struct HnapLogin {
    pub keys: HnapKeys,
    pub algorithm: HmacAlgorithm,
    /// Number of handshakes it took (1, or 2 after falling back).
    pub attempts: usize,
    /// Raw body of the accepted login-submit response.
    pub body: String,
}

/// Parsed response envelope, batched or single.
#[derive(Debug, Clone)]
pub struct HnapBatchResponse {
    root: Value,
}

impl HnapBatchResponse {
    pub fn parse(body: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(body).map_err(|e| {
            AppError::protocol(format!("HNAP response is not JSON: {e}"))
        })?;
        if !root.is_object() {
            return Err(AppError::protocol("HNAP response is not a JSON object"));
        }
        Ok(Self { root })
    }

    fn batch(&self) -> Option<&Value> {
        self.root
            .get(format!("{}{}", constants::MULTIPLE_ACTION, constants::RESPONSE_SUFFIX))
    }

    /// `GetMultipleHNAPsResult`, if this was a batched call.
    pub fn result(&self) -> Option<&str> {
        self.batch()?
            .get(format!("{}{}", constants::MULTIPLE_ACTION, constants::RESULT_SUFFIX))?
            .as_str()
    }

    /// Payload of one action, looked up inside a batch or at the top level.
    pub fn action(&self, action: &str) -> Option<&Value> {
        let key = format!("{action}{}", constants::RESPONSE_SUFFIX);
        self.batch()
            .and_then(|batch| batch.get(&key))
            .or_else(|| self.root.get(&key))
    }

    /// `<Action>Result` for one action.
    pub fn action_result(&self, action: &str) -> Option<&str> {
        self.field(action, &format!("{action}{}", constants::RESULT_SUFFIX))
    }

    pub fn field(&self, action: &str, field: &str) -> Option<&str> {
        self.action(action)?.get(field)?.as_str()
    }

    /// Split a delimited list field into raw records.
    pub fn records(&self, action: &str, field: &str) -> Vec<Vec<String>> {
        self.field(action, field)
            .map(delimited::split_records)
            .unwrap_or_default()
    }

    /// Split a delimited list field and name fields by position.
    pub fn table(
        &self,
        action: &str,
        field: &str,
        order: &[&str],
    ) -> Result<Vec<BTreeMap<String, String>>> {
        let raw = self.field(action, field).ok_or_else(|| {
            AppError::protocol(format!("{action} response has no field {field}"))
        })?;
        delimited::parse_table(raw, order)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

/// Builds HNAP envelopes and runs the handshake against one endpoint.
#[derive(Debug, Clone)]
pub struct HnapBuilder {
    endpoint: String,
    namespace: String,
}

impl Default for HnapBuilder {
    fn default() -> Self {
        Self::new(constants::HNAP_ENDPOINT, constants::HNAP_NAMESPACE)
    }
}

impl HnapBuilder {
    pub fn new(endpoint: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: namespace.into(),
        }
    }

    pub fn from_config(config: &HnapConfig) -> Self {
        Self::new(config.endpoint.clone(), config.namespace.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `"<namespace><action>"`, quotes included.
    pub fn soap_action(&self, action: &str) -> String {
        format!("\"{}{}\"", self.namespace, action)
    }

    fn login_envelope(&self, phase: &str, username: &str, login_password: &str) -> Value {
        let mut fields = Map::new();
        fields.insert(login::ACTION.to_string(), Value::from(phase));
        fields.insert(login::USERNAME.to_string(), Value::from(username));
        fields.insert(login::LOGIN_PASSWORD.to_string(), Value::from(login_password));
        fields.insert(login::CAPTCHA.to_string(), Value::from(""));
        fields.insert(
            login::PRIVATE_LOGIN.to_string(),
            Value::from(login::PRIVATE_LOGIN_VALUE),
        );
        wrap(constants::LOGIN_ACTION, Value::Object(fields))
    }

    pub fn login_request_envelope(&self, username: &str) -> Value {
        self.login_envelope(login::PHASE_REQUEST, username, "")
    }

    pub fn login_submit_envelope(&self, username: &str, login_password: &str) -> Value {
        self.login_envelope(login::PHASE_LOGIN, username, login_password)
    }

    /// One envelope requesting several actions at once.
    pub fn batch_envelope<S: AsRef<str>>(&self, actions: &[S]) -> Value {
        let inner: Map<String, Value> = actions
            .iter()
            .map(|action| (action.as_ref().to_string(), Value::String(String::new())))
            .collect();
        wrap(constants::MULTIPLE_ACTION, Value::Object(inner))
    }

    /// `HNAP_AUTH` value: `HMAC(key, timestamp + soap_action)` and the timestamp.
    ///
    /// The message uses the quoted, namespaced `SOAPAction` value, not the
    /// bare action name; devices reject signatures over the bare name.
    pub fn auth_header(
        &self,
        algorithm: HmacAlgorithm,
        key: &str,
        action: &str,
        timestamp: u128,
    ) -> Result<String> {
        let message = format!("{timestamp}{}", self.soap_action(action));
        let signature = hmac_hex(algorithm, key, &message)?;
        Ok(format!("{signature} {timestamp}"))
    }

    /// Build a signed request for `action`. Without keys the pre-login key
    /// is used.
    pub fn request(
        &self,
        client: &DeviceClient,
        action: &str,
        envelope: &Value,
        algorithm: HmacAlgorithm,
        keys: Option<&HnapKeys>,
    ) -> Result<HttpRequest> {
        let (algorithm, key) = match keys {
            Some(keys) => (keys.algorithm(), keys.private_key()),
            None => (algorithm, constants::PRE_LOGIN_KEY),
        };
        let auth = self.auth_header(algorithm, key, action, timestamp_now())?;
        Ok(
            HttpRequest::post(client.url(&self.endpoint)?, CONTENT_TYPE_JSON, envelope.to_string())
                .header(constants::SOAP_ACTION_HEADER, self.soap_action(action))
                .header(constants::HNAP_AUTH_HEADER, auth)
                .no_redirects(),
        )
    }

    pub fn parse_challenge(body: &str) -> Result<Challenge> {
        let response = HnapBatchResponse::parse(body)?;
        let action = constants::LOGIN_ACTION;
        let get = |field: &str| -> Result<String> {
            response
                .field(action, field)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| AppError::protocol(format!("login challenge missing {field}")))
        };
        Ok(Challenge {
            challenge: get(login::CHALLENGE)?,
            public_key: get(login::PUBLIC_KEY)?,
            cookie: get(login::COOKIE)?,
        })
    }

    pub fn parse_login_code(body: &str) -> Result<LoginCode> {
        let response = HnapBatchResponse::parse(body)?;
        response
            .action_result(constants::LOGIN_ACTION)
            .map(LoginCode::parse)
            .ok_or_else(|| AppError::protocol("login response has no LoginResult"))
    }

    async fn post(
        &self,
        client: &DeviceClient,
        jar: &mut CookieJar,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let response = client.execute(request, jar).await?;
        if !response.is_success() {
            return Err(AppError::protocol(format!(
                "HNAP endpoint returned HTTP {}",
                response.status
            )));
        }
        Ok(response)
    }

    /// One complete challenge + submit exchange with a single hash.
    pub async fn handshake(
        &self,
        client: &DeviceClient,
        jar: &mut CookieJar,
        credentials: &Credentials,
        algorithm: HmacAlgorithm,
    ) -> Result<(LoginCode, Option<HnapKeys>, String)> {
        jar.set(constants::UID_COOKIE, "");
        jar.set(constants::PRIVATE_KEY_COOKIE, "");

        let envelope = self.login_request_envelope(credentials.username());
        let request = self.request(client, constants::LOGIN_ACTION, &envelope, algorithm, None)?;
        let response = self.post(client, jar, request).await?;
        let challenge = Self::parse_challenge(&response.body)?;
        jar.set(constants::UID_COOKIE, challenge.cookie.clone());

        let private_key = derive_private_key(
            algorithm,
            &challenge.challenge,
            &challenge.public_key,
            credentials.password(),
        )?;
        let login_password = derive_login_password(algorithm, &private_key, &challenge.challenge)?;
        let keys = HnapKeys::new(private_key, algorithm);
        jar.set(constants::PRIVATE_KEY_COOKIE, keys.private_key().to_string());

        let envelope = self.login_submit_envelope(credentials.username(), &login_password);
        let request = self.request(
            client,
            constants::LOGIN_ACTION,
            &envelope,
            algorithm,
            Some(&keys),
        )?;
        let response = self.post(client, jar, request).await?;
        let code = Self::parse_login_code(&response.body)?;

        if code == LoginCode::Ok {
            Ok((code, Some(keys), response.body))
        } else {
            jar.set(constants::PRIVATE_KEY_COOKIE, "");
            Ok((code, None, response.body))
        }
    }

    /// Log in, trying each algorithm in `order` once. Lockout and
    /// reboot-required stop immediately; a rejected or malformed handshake
    /// moves on to the next algorithm.
    ///
    /// Fails with `Validation` when `order` is empty.
    pub async fn login(
        &self,
        client: &DeviceClient,
        jar: &mut CookieJar,
        credentials: &Credentials,
        order: &[HmacAlgorithm],
    ) -> Result<HnapLogin> {
        if order.is_empty() {
            return Err(AppError::validation("no HNAP hash algorithm to try"));
        }
        let mut rejection = None;
        let mut protocol_error = None;

        for (index, algorithm) in order.iter().copied().enumerate() {
            client.ensure_active()?;
            match self.handshake(client, jar, credentials, algorithm).await {
                Ok((LoginCode::Ok, Some(keys), body)) => {
                    log::info!("HNAP login succeeded using {}", algorithm);
                    return Ok(HnapLogin {
                        keys,
                        algorithm,
                        attempts: index + 1,
                        body,
                    });
                }
                Ok((code, _, body)) => {
                    let kind = code
                        .failure()
                        .unwrap_or(AuthFailureKind::InvalidCredentials);
                    log::debug!("HNAP login response: {}", redact_text(&body));
                    if matches!(
                        kind,
                        AuthFailureKind::LockedOut | AuthFailureKind::RebootRequired
                    ) {
                        log::warn!("HNAP login using {} refused: {}", algorithm, kind);
                        return Err(AppError::auth(kind));
                    }
                    log::info!("HNAP login using {} rejected ({:?})", algorithm, code);
                    rejection = Some(kind);
                }
                Err(error @ AppError::Protocol(_)) => {
                    log::info!("HNAP handshake using {} failed: {}", algorithm, error);
                    protocol_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        // A device-reported rejection says more than a garbled reply.
        match (rejection, protocol_error) {
            (Some(kind), _) => Err(AppError::auth(kind)),
            (None, Some(error)) => Err(error),
            (None, None) => Err(AppError::auth(AuthFailureKind::InvalidCredentials)),
        }
    }

    /// Send one envelope with session keys and return the raw response.
    pub async fn call_raw(
        &self,
        client: &DeviceClient,
        jar: &mut CookieJar,
        keys: &HnapKeys,
        action: &str,
        envelope: &Value,
    ) -> Result<HttpResponse> {
        let request = self.request(client, action, envelope, keys.algorithm(), Some(keys))?;
        client.execute(request, jar).await
    }

    /// Batched read of several actions in one envelope. The body is
    /// returned as sent; expiry is left to the caller.
    pub async fn call_batch<S: AsRef<str>>(
        &self,
        client: &DeviceClient,
        jar: &mut CookieJar,
        keys: &HnapKeys,
        actions: &[S],
    ) -> Result<HttpResponse> {
        let envelope = self.batch_envelope(actions);
        self.call_raw(client, jar, keys, constants::MULTIPLE_ACTION, &envelope)
            .await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::fixtures::*;
    use super::*;
    use crate::utils::http::Method;
    use crate::utils::http::testing::{Canned, ScriptedTransport, client};

    #[test]
    fn test_private_key_is_deterministic() {
        let a = derive_private_key(HmacAlgorithm::Md5, "chal", "pub", "secret").unwrap();
        let b = derive_private_key(HmacAlgorithm::Md5, "chal", "pub", "secret").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, a.to_uppercase());
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_private_key_depends_on_every_input() {
        let base = derive_private_key(HmacAlgorithm::Md5, "chal", "pub", "secret").unwrap();
        assert_ne!(
            base,
            derive_private_key(HmacAlgorithm::Md5, "chal2", "pub", "secret").unwrap()
        );
        assert_ne!(
            base,
            derive_private_key(HmacAlgorithm::Md5, "chal", "pub2", "secret").unwrap()
        );
        assert_ne!(
            base,
            derive_private_key(HmacAlgorithm::Md5, "chal", "pub", "secret2").unwrap()
        );
        let sha = derive_private_key(HmacAlgorithm::Sha256, "chal", "pub", "secret").unwrap();
        assert_ne!(base, sha);
        assert_eq!(sha.len(), 64);
    }

    #[test]
    fn test_known_hmac_md5_vector() {
        // RFC 2202 test case 2
        let mac = hmac_hex(HmacAlgorithm::Md5, "Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(mac, "750C783E6AB0B503EAA86E310A5DB738");
    }

    #[test]
    fn test_known_hmac_sha256_vector() {
        // RFC 4231 test case 2
        let mac =
            hmac_hex(HmacAlgorithm::Sha256, "Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            mac,
            "5BDCC146BF60754E6A042426089575C75A003F089D2739839DEC58B964EC3843"
        );
    }

    #[test]
    fn test_soap_action_and_auth_header() {
        let builder = HnapBuilder::default();
        assert_eq!(
            builder.soap_action("Login"),
            "\"http://purenetworks.com/HNAP1/Login\""
        );

        let header = builder
            .auth_header(HmacAlgorithm::Md5, "KEY", "Login", 1234)
            .unwrap();
        let (signature, timestamp) = header.split_once(' ').unwrap();
        assert_eq!(timestamp, "1234");
        assert_eq!(
            signature,
            hmac_hex(
                HmacAlgorithm::Md5,
                "KEY",
                "1234\"http://purenetworks.com/HNAP1/Login\""
            )
            .unwrap()
        );
    }

    #[test]
    fn test_envelopes() {
        let builder = HnapBuilder::default();
        let request = builder.login_request_envelope("admin");
        assert_eq!(request["Login"]["Action"], "request");
        assert_eq!(request["Login"]["Username"], "admin");
        assert_eq!(request["Login"]["LoginPassword"], "");

        let submit = builder.login_submit_envelope("admin", "HASH");
        assert_eq!(submit["Login"]["Action"], "login");
        assert_eq!(submit["Login"]["LoginPassword"], "HASH");

        let batch = builder.batch_envelope(&["A", "B"]);
        assert_eq!(batch["GetMultipleHNAPs"]["A"], "");
        assert_eq!(batch["GetMultipleHNAPs"]["B"], "");
    }

    #[test]
    fn test_login_codes() {
        assert_eq!(LoginCode::parse("OK"), LoginCode::Ok);
        assert_eq!(LoginCode::parse("failed"), LoginCode::Failed);
        assert_eq!(LoginCode::parse("LOCKUP"), LoginCode::Locked);
        assert_eq!(LoginCode::parse("REBOOT"), LoginCode::RebootRequired);
        assert_eq!(
            LoginCode::Locked.failure(),
            Some(AuthFailureKind::LockedOut)
        );
        assert_eq!(
            LoginCode::RebootRequired.failure(),
            Some(AuthFailureKind::RebootRequired)
        );
        assert_eq!(LoginCode::Ok.failure(), None);
    }

    #[test]
    fn test_parse_challenge() {
        let challenge = HnapBuilder::parse_challenge(CHALLENGE).unwrap();
        assert_eq!(challenge.challenge, "CH4LL3NG3");
        assert_eq!(challenge.public_key, "PUBKEY");
        assert_eq!(challenge.cookie, "COOKIE42");

        assert!(HnapBuilder::parse_challenge(LOGIN_OK).is_err());
        assert!(HnapBuilder::parse_challenge("<html>").is_err());
    }

    #[test]
    fn test_batch_response_lookup() {
        let response = HnapBatchResponse::parse(BATCH).unwrap();
        assert_eq!(response.result(), Some("OK"));
        assert_eq!(
            response.action_result("GetCustomerStatusDownstreamChannelInfo"),
            Some("OK")
        );
        let records = response.records(
            "GetCustomerStatusDownstreamChannelInfo",
            "CustomerConnDownstreamChannel",
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][4], "465.0");

        let table = response
            .table(
                "GetCustomerStatusDownstreamChannelInfo",
                "CustomerConnDownstreamChannel",
                &["channel", "lock_status", "modulation", "channel_id", "frequency"],
            )
            .unwrap();
        assert_eq!(table[0]["frequency"], "543.0");
        assert!(response.table("Missing", "Field", &["a"]).is_err());
    }

    fn hnap_transport(replies: &[&str]) -> Arc<ScriptedTransport> {
        let transport = ScriptedTransport::new();
        for reply in replies {
            transport.push(Method::Post, "/HNAP1/", Canned::ok(*reply));
        }
        Arc::new(transport)
    }

    #[tokio::test]
    async fn test_handshake_success_sets_cookies() {
        let transport = hnap_transport(&[CHALLENGE, LOGIN_OK]);
        let client = client(transport.clone());
        let mut jar = CookieJar::new();
        let creds = Credentials::new("admin", "password");

        let login = HnapBuilder::default()
            .login(&client, &mut jar, &creds, &[HmacAlgorithm::Md5, HmacAlgorithm::Sha256])
            .await
            .unwrap();

        assert_eq!(login.algorithm, HmacAlgorithm::Md5);
        assert_eq!(login.attempts, 1);
        assert_eq!(jar.get("uid"), Some("COOKIE42"));
        let expected = derive_private_key(HmacAlgorithm::Md5, "CH4LL3NG3", "PUBKEY", "password")
            .unwrap();
        assert_eq!(login.keys.private_key(), expected);
        assert_eq!(jar.get("PrivateKey"), Some(expected.as_str()));

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].header("SOAPAction"),
            Some("\"http://purenetworks.com/HNAP1/Login\"")
        );
        assert!(calls[0].header("HNAP_AUTH").is_some());
        let submitted: Value = serde_json::from_str(calls[1].body.as_deref().unwrap()).unwrap();
        let expected_password =
            derive_login_password(HmacAlgorithm::Md5, &expected, "CH4LL3NG3").unwrap();
        assert_eq!(submitted["Login"]["LoginPassword"], expected_password);
    }

    #[tokio::test]
    async fn test_falls_back_once_to_second_algorithm() {
        let transport = hnap_transport(&[CHALLENGE, LOGIN_FAILED, CHALLENGE, LOGIN_OK]);
        let client = client(transport.clone());
        let mut jar = CookieJar::new();
        let creds = Credentials::new("admin", "password");

        let login = HnapBuilder::default()
            .login(&client, &mut jar, &creds, &[HmacAlgorithm::Md5, HmacAlgorithm::Sha256])
            .await
            .unwrap();

        assert_eq!(login.algorithm, HmacAlgorithm::Sha256);
        assert_eq!(login.attempts, 2);
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn test_both_algorithms_rejected_is_invalid_credentials() {
        let transport = hnap_transport(&[CHALLENGE, LOGIN_FAILED, CHALLENGE, LOGIN_FAILED]);
        let client = client(transport.clone());
        let mut jar = CookieJar::new();
        let creds = Credentials::new("admin", "wrong");

        let err = HnapBuilder::default()
            .login(&client, &mut jar, &creds, &[HmacAlgorithm::Md5, HmacAlgorithm::Sha256])
            .await
            .unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthFailureKind::InvalidCredentials));
        assert_eq!(transport.call_count(), 4);
        assert!(!jar.contains("PrivateKey"));
    }

    #[tokio::test]
    async fn test_lockout_does_not_fall_back() {
        let transport = hnap_transport(&[CHALLENGE, LOGIN_LOCKUP]);
        let client = client(transport.clone());
        let mut jar = CookieJar::new();
        let creds = Credentials::new("admin", "password");

        let err = HnapBuilder::default()
            .login(&client, &mut jar, &creds, &[HmacAlgorithm::Md5, HmacAlgorithm::Sha256])
            .await
            .unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthFailureKind::LockedOut));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reboot_required_is_distinct() {
        let transport = hnap_transport(&[CHALLENGE, LOGIN_REBOOT]);
        let client = client(transport);
        let mut jar = CookieJar::new();
        let creds = Credentials::new("admin", "password");

        let err = HnapBuilder::default()
            .login(&client, &mut jar, &creds, &[HmacAlgorithm::Md5])
            .await
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthFailureKind::RebootRequired));
    }

    #[tokio::test]
    async fn test_call_batch_signs_one_envelope() {
        let transport = hnap_transport(&[BATCH]);
        let client = client(transport.clone());
        let mut jar = CookieJar::new();
        let keys = HnapKeys::new("KEY", HmacAlgorithm::Md5);

        let response = HnapBuilder::default()
            .call_batch(
                &client,
                &mut jar,
                &keys,
                &["GetCustomerStatusConnectionInfo", "GetCustomerStatusDownstreamChannelInfo"],
            )
            .await
            .unwrap();
        assert_eq!(response.body, BATCH);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].header("SOAPAction"),
            Some("\"http://purenetworks.com/HNAP1/GetMultipleHNAPs\"")
        );
        assert!(calls[0].header("HNAP_AUTH").is_some());
        let body = calls[0].body.as_deref().unwrap();
        assert!(body.contains("GetCustomerStatusConnectionInfo"));
    }
}
