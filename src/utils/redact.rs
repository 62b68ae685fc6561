// src/utils/redact.rs

//! Credential redaction for logs and captured evidence.
//!
//! Anything that might echo a request (form bodies, login URLs, HNAP
//! envelopes, cookie headers) goes through here before it is logged or
//! stored as a discovery signal.

use std::sync::LazyLock;

use regex::Regex;

/// Replacement for redacted values.
pub const MASK: &str = "***";

/// Field names whose values are always secret.
const SECRET_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "pass",
    "loginpassword",
    "privatekey",
    "private_key",
    "uid",
    "credential",
    "token",
    "authorization",
    "hnap_auth",
    "cookie",
    "arguments",
    "arg",
];

/// `key=value` pairs in query strings, form bodies and cookie headers.
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b([A-Za-z_][A-Za-z0-9_\-]*)=([^&;\s"']*)"#).expect("static regex")
});

/// `"key": "value"` pairs in JSON envelopes.
static JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"([A-Za-z_][A-Za-z0-9_\-]*)"\s*:\s*"([^"]*)""#).expect("static regex")
});

/// Embedded login and session tokens (`login_<b64>`, `ct_<token>`).
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(login_|ct_)[A-Za-z0-9+/=%\-_]+").expect("static regex"));

/// `Authorization: Basic xxx` style header values.
static AUTH_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(Basic|Bearer)\s+[A-Za-z0-9+/=._\-]+").expect("static regex"));

/// Whether a field name carries secret material.
pub fn is_secret_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SECRET_KEYS.contains(&lower.as_str()) || lower.contains("password") || lower.ends_with("key")
}

/// Redact every credential-looking value in free text.
pub fn redact_text(text: &str) -> String {
    let text = TOKEN_RE.replace_all(text, |caps: &regex::Captures| format!("{}{MASK}", &caps[1]));
    let text = AUTH_HEADER_RE.replace_all(&text, |caps: &regex::Captures| {
        format!("{} {MASK}", &caps[1])
    });
    let text = JSON_RE.replace_all(&text, |caps: &regex::Captures| {
        if is_secret_key(&caps[1]) {
            format!("\"{}\":\"{MASK}\"", &caps[1])
        } else {
            caps[0].to_string()
        }
    });
    let text = PAIR_RE.replace_all(&text, |caps: &regex::Captures| {
        if is_secret_key(&caps[1]) {
            format!("{}={MASK}", &caps[1])
        } else {
            caps[0].to_string()
        }
    });
    text.into_owned()
}

/// Redact a single named value.
pub fn redact_field(name: &str, value: &str) -> String {
    if is_secret_key(name) {
        MASK.to_string()
    } else {
        redact_text(value)
    }
}
