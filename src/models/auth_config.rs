// src/models/auth_config.rs

//! Persisted authentication configuration, one variant per strategy family.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Strategy family tag, as stored in the `strategy` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    None,
    BasicHeader,
    Form,
    Hnap,
    UrlToken,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::None,
        StrategyKind::BasicHeader,
        StrategyKind::Form,
        StrategyKind::Hnap,
        StrategyKind::UrlToken,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            StrategyKind::None => "none",
            StrategyKind::BasicHeader => "basic_header",
            StrategyKind::Form => "form",
            StrategyKind::Hnap => "hnap",
            StrategyKind::UrlToken => "url_token",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn requires_credentials(&self) -> bool {
        !matches!(self, StrategyKind::None)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Hash function used by the HNAP HMAC handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HmacAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl HmacAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HmacAlgorithm::Md5 => "md5",
            HmacAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the password is placed in a login form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordEncoding {
    /// Sent verbatim.
    #[default]
    Plain,
    /// Sent base64 encoded.
    Base64,
    /// Combined with a client nonce, then base64 encoded; nonce sent separately.
    Nonce,
}

/// Form strategy variant, derived from encoding and refresh behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormVariant {
    Plain,
    Base64,
    Nonce,
    Dynamic,
}

impl FormVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormVariant::Plain => "plain",
            FormVariant::Base64 => "base64",
            FormVariant::Nonce => "nonce",
            FormVariant::Dynamic => "dynamic",
        }
    }
}

/// How a form login decides it succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "check", content = "pattern", rename_all = "snake_case")]
pub enum SuccessCheck {
    /// The redirect location after submit contains this substring.
    RedirectContains(String),
    /// The response body after submit contains this substring.
    BodyContains(String),
    /// The page reached after submit is not a login page.
    #[default]
    NotLoginPage,
}

/// HTTP `Authorization` header credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BasicHeaderConfig {
    /// Realm announced in `WWW-Authenticate`, kept for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

/// URL-encoded form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Page that carries the login form.
    #[serde(default = "defaults::login_page")]
    pub login_page: String,

    /// Path the form posts to.
    pub action: String,

    #[serde(default = "defaults::username_field")]
    pub username_field: String,

    #[serde(default = "defaults::password_field")]
    pub password_field: String,

    #[serde(default)]
    pub encoding: PasswordEncoding,

    /// Re-read action and field names from the live login page before
    /// every submit.
    #[serde(default)]
    pub refresh_form: bool,

    /// Static hidden inputs replayed with every submit.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hidden_fields: BTreeMap<String, String>,

    #[serde(default = "defaults::nonce_field")]
    pub nonce_field: String,

    #[serde(default = "defaults::nonce_length")]
    pub nonce_length: usize,

    #[serde(default)]
    pub success: SuccessCheck,
}

impl FormConfig {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            login_page: defaults::login_page(),
            action: action.into(),
            username_field: defaults::username_field(),
            password_field: defaults::password_field(),
            encoding: PasswordEncoding::default(),
            refresh_form: false,
            hidden_fields: BTreeMap::new(),
            nonce_field: defaults::nonce_field(),
            nonce_length: defaults::nonce_length(),
            success: SuccessCheck::default(),
        }
    }

    pub fn variant(&self) -> FormVariant {
        if self.refresh_form {
            return FormVariant::Dynamic;
        }
        match self.encoding {
            PasswordEncoding::Plain => FormVariant::Plain,
            PasswordEncoding::Base64 => FormVariant::Base64,
            PasswordEncoding::Nonce => FormVariant::Nonce,
        }
    }
}

/// HNAP challenge-response session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnapConfig {
    #[serde(default = "defaults::hnap_endpoint")]
    pub endpoint: String,

    #[serde(default = "defaults::hnap_namespace")]
    pub namespace: String,

    /// Hash tried first when nothing has been negotiated yet.
    #[serde(default)]
    pub primary_algorithm: HmacAlgorithm,

    /// Hash tried once if the primary handshake fails outright.
    #[serde(default = "defaults::fallback_algorithm")]
    pub fallback_algorithm: Option<HmacAlgorithm>,

    /// Hash that completed the last successful handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiated_algorithm: Option<HmacAlgorithm>,

    /// Actions requested in each batched poll.
    #[serde(default)]
    pub data_actions: Vec<String>,
}

impl Default for HnapConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::hnap_endpoint(),
            namespace: defaults::hnap_namespace(),
            primary_algorithm: HmacAlgorithm::default(),
            fallback_algorithm: defaults::fallback_algorithm(),
            negotiated_algorithm: None,
            data_actions: Vec::new(),
        }
    }
}

impl HnapConfig {
    /// Algorithms to try in one login call: the negotiated one (or the
    /// primary), then one alternative.
    pub fn algorithm_order(&self) -> Vec<HmacAlgorithm> {
        let first = self.negotiated_algorithm.unwrap_or(self.primary_algorithm);
        let mut order = vec![first];
        for candidate in [Some(self.primary_algorithm), self.fallback_algorithm]
            .into_iter()
            .flatten()
        {
            if !order.contains(&candidate) {
                order.push(candidate);
                break;
            }
        }
        order
    }
}

/// Credentials in a login-prefixed query value, session cookie turned
/// into a prefixed token on later requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTokenConfig {
    #[serde(default = "defaults::token_login_path")]
    pub login_path: String,

    #[serde(default = "defaults::login_prefix")]
    pub login_prefix: String,

    #[serde(default = "defaults::token_prefix")]
    pub token_prefix: String,

    #[serde(default = "defaults::cookie_name")]
    pub cookie_name: String,

    /// Also send an `Authorization: Basic` header with the login request.
    #[serde(default = "defaults::yes")]
    pub send_basic_header: bool,
}

impl Default for UrlTokenConfig {
    fn default() -> Self {
        Self {
            login_path: defaults::token_login_path(),
            login_prefix: defaults::login_prefix(),
            token_prefix: defaults::token_prefix(),
            cookie_name: defaults::cookie_name(),
            send_basic_header: true,
        }
    }
}

/// Everything needed to replay one authentication strategy.
///
/// Never holds user credentials. The only field that changes after
/// discovery is the negotiated HNAP hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AuthConfig {
    None,
    BasicHeader(BasicHeaderConfig),
    Form(FormConfig),
    Hnap(HnapConfig),
    UrlToken(UrlTokenConfig),
}

impl AuthConfig {
    pub fn kind(&self) -> StrategyKind {
        match self {
            AuthConfig::None => StrategyKind::None,
            AuthConfig::BasicHeader(_) => StrategyKind::BasicHeader,
            AuthConfig::Form(_) => StrategyKind::Form,
            AuthConfig::Hnap(_) => StrategyKind::Hnap,
            AuthConfig::UrlToken(_) => StrategyKind::UrlToken,
        }
    }

    pub fn negotiated_algorithm(&self) -> Option<HmacAlgorithm> {
        match self {
            AuthConfig::Hnap(hnap) => hnap.negotiated_algorithm,
            _ => None,
        }
    }

    /// Record the hash a handshake settled on. Returns true if it changed.
    pub fn record_negotiated_algorithm(&mut self, algorithm: HmacAlgorithm) -> bool {
        match self {
            AuthConfig::Hnap(hnap) if hnap.negotiated_algorithm != Some(algorithm) => {
                hnap.negotiated_algorithm = Some(algorithm);
                true
            }
            _ => false,
        }
    }

    /// Parse a persisted record, failing closed on unknown strategy tags.
    pub fn from_value(value: Value) -> Result<Self> {
        let tag = value
            .get("strategy")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::UnsupportedStrategy("<missing strategy tag>".to_string()))?;
        if StrategyKind::from_tag(tag).is_none() {
            return Err(AppError::UnsupportedStrategy(tag.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Sanity checks for hand-written or hinted configs.
    pub fn validate(&self) -> Result<()> {
        match self {
            AuthConfig::Form(form) => {
                if form.action.trim().is_empty() {
                    return Err(AppError::validation("form.action is empty"));
                }
                if form.password_field.trim().is_empty() {
                    return Err(AppError::validation("form.password_field is empty"));
                }
                if form.encoding == PasswordEncoding::Nonce && form.nonce_length == 0 {
                    return Err(AppError::validation("form.nonce_length must be > 0"));
                }
            }
            AuthConfig::Hnap(hnap) => {
                if hnap.endpoint.trim().is_empty() {
                    return Err(AppError::validation("hnap.endpoint is empty"));
                }
            }
            AuthConfig::UrlToken(token) => {
                if token.login_prefix.is_empty() || token.token_prefix.is_empty() {
                    return Err(AppError::validation("url_token prefixes must not be empty"));
                }
            }
            AuthConfig::None | AuthConfig::BasicHeader(_) => {}
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::None
    }
}

mod defaults {
    use super::HmacAlgorithm;

    pub fn login_page() -> String {
        "/".into()
    }
    pub fn username_field() -> String {
        "username".into()
    }
    pub fn password_field() -> String {
        "password".into()
    }
    pub fn nonce_field() -> String {
        "ar_nonce".into()
    }
    pub fn nonce_length() -> usize {
        8
    }
    pub fn hnap_endpoint() -> String {
        crate::hnap::constants::HNAP_ENDPOINT.into()
    }
    pub fn hnap_namespace() -> String {
        crate::hnap::constants::HNAP_NAMESPACE.into()
    }
    pub fn fallback_algorithm() -> Option<HmacAlgorithm> {
        Some(HmacAlgorithm::Sha256)
    }
    pub fn token_login_path() -> String {
        "/cmconnectionstatus.html".into()
    }
    pub fn login_prefix() -> String {
        "login_".into()
    }
    pub fn token_prefix() -> String {
        "ct_".into()
    }
    pub fn cookie_name() -> String {
        "credential".into()
    }
    pub fn yes() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip_through_kind() {
        for kind in StrategyKind::ALL {
            assert_eq!(StrategyKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(StrategyKind::from_tag("kerberos"), None);
    }

    #[test]
    fn test_serialized_tag_matches_kind() {
        let config = AuthConfig::UrlToken(UrlTokenConfig::default());
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["strategy"], "url_token");

        let none = serde_json::to_value(AuthConfig::None).unwrap();
        assert_eq!(none["strategy"], "none");
    }

    #[test]
    fn test_unknown_tag_fails_closed() {
        let err = AuthConfig::from_json(r#"{"strategy":"oauth_device_flow","x":1}"#).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedStrategy(tag) if tag == "oauth_device_flow"));

        let err = AuthConfig::from_json(r#"{"action":"/login"}"#).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedStrategy(_)));
    }

    #[test]
    fn test_form_defaults_fill_in() {
        let config = AuthConfig::from_json(r#"{"strategy":"form","action":"/goform/login"}"#).unwrap();
        let AuthConfig::Form(form) = config else {
            panic!("expected form config");
        };
        assert_eq!(form.username_field, "username");
        assert_eq!(form.success, SuccessCheck::NotLoginPage);
        assert_eq!(form.variant(), FormVariant::Plain);
    }

    #[test]
    fn test_success_check_serialization() {
        let check = SuccessCheck::RedirectContains("MotoHome".into());
        let value = serde_json::to_value(&check).unwrap();
        assert_eq!(value["check"], "redirect_contains");
        assert_eq!(value["pattern"], "MotoHome");
    }

    #[test]
    fn test_algorithm_order() {
        let mut hnap = HnapConfig::default();
        assert_eq!(
            hnap.algorithm_order(),
            vec![HmacAlgorithm::Md5, HmacAlgorithm::Sha256]
        );

        hnap.negotiated_algorithm = Some(HmacAlgorithm::Sha256);
        assert_eq!(
            hnap.algorithm_order(),
            vec![HmacAlgorithm::Sha256, HmacAlgorithm::Md5]
        );

        hnap.fallback_algorithm = None;
        hnap.negotiated_algorithm = None;
        assert_eq!(hnap.algorithm_order(), vec![HmacAlgorithm::Md5]);
    }

    #[test]
    fn test_record_negotiated_algorithm() {
        let mut config = AuthConfig::Hnap(HnapConfig::default());
        assert!(config.record_negotiated_algorithm(HmacAlgorithm::Sha256));
        assert!(!config.record_negotiated_algorithm(HmacAlgorithm::Sha256));
        assert_eq!(config.negotiated_algorithm(), Some(HmacAlgorithm::Sha256));

        let mut none = AuthConfig::None;
        assert!(!none.record_negotiated_algorithm(HmacAlgorithm::Sha256));
    }

    #[test]
    fn test_validate_rejects_empty_action() {
        let config = AuthConfig::Form(FormConfig::new(" "));
        assert!(config.validate().is_err());
    }
}
