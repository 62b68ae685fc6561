//! HNAP protocol constants.

/// Endpoint every HNAP envelope is posted to.
pub const HNAP_ENDPOINT: &str = "/HNAP1/";

/// Namespace prefixed to action names in the `SOAPAction` header.
pub const HNAP_NAMESPACE: &str = "http://purenetworks.com/HNAP1/";

/// Header naming the action, value `"<namespace><Action>"` with quotes.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Header carrying `<HMAC> <timestamp>`.
pub const HNAP_AUTH_HEADER: &str = "HNAP_AUTH";

/// HMAC key used for the auth header before a private key exists.
pub const PRE_LOGIN_KEY: &str = "withoutloginkey";

/// Login action name.
pub const LOGIN_ACTION: &str = "Login";

/// Batched read action name.
pub const MULTIPLE_ACTION: &str = "GetMultipleHNAPs";

/// Cookie holding the session identifier returned by the challenge.
pub const UID_COOKIE: &str = "uid";

/// Cookie holding the derived private key.
pub const PRIVATE_KEY_COOKIE: &str = "PrivateKey";

/// Marker the device puts in responses once the session is invalidated.
pub const SESSION_EXPIRED_MARKER: &str = "UN-AUTH";

/// Separator between repeated records in list-valued fields.
pub const RECORD_SEPARATOR: &str = "|+|";

/// Separator between fields within one record.
pub const FIELD_SEPARATOR: &str = "^";

/// Timestamps are milliseconds since the epoch, reduced modulo this value.
pub const TIMESTAMP_MODULUS: u128 = 2_000_000_000_000;

/// Envelope key suffixes.
pub const RESPONSE_SUFFIX: &str = "Response";
pub const RESULT_SUFFIX: &str = "Result";

/// Login envelope field names and fixed values.
pub mod login {
    pub const ACTION: &str = "Action";
    pub const USERNAME: &str = "Username";
    pub const LOGIN_PASSWORD: &str = "LoginPassword";
    pub const CAPTCHA: &str = "Captcha";
    pub const PRIVATE_LOGIN: &str = "PrivateLogin";
    pub const PRIVATE_LOGIN_VALUE: &str = "LoginPassword";
    pub const PHASE_REQUEST: &str = "request";
    pub const PHASE_LOGIN: &str = "login";
    pub const CHALLENGE: &str = "Challenge";
    pub const PUBLIC_KEY: &str = "PublicKey";
    pub const COOKIE: &str = "Cookie";
}

/// Result codes returned in `<Action>Result`.
pub mod result {
    pub const OK: &str = "OK";
    pub const FAILED: &str = "FAILED";
    pub const LOCKUP: &str = "LOCKUP";
    pub const LOCKED: &str = "LOCKED";
    pub const REBOOT: &str = "REBOOT";
}
