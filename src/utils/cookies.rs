// src/utils/cookies.rs

//! Minimal cookie jar for device sessions.
//!
//! Device web servers set a handful of plain cookies on a single host, so
//! the jar is a name/value map replayed verbatim as one `Cookie` header.

use std::collections::BTreeMap;
use std::fmt;

/// Cookies collected for one device session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace a cookie. An empty value removes it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if value.is_empty() {
            self.cookies.remove(&name);
        } else {
            self.cookies.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Absorb one raw `Set-Cookie` header value.
    pub fn absorb_set_cookie(&mut self, header: &str) {
        if let Some((name, value, expired)) = parse_set_cookie(header) {
            if expired {
                self.cookies.remove(&name);
            } else {
                self.set(name, value);
            }
        }
    }

    /// Value for the `Cookie` request header, if any cookie is set.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Cookie names, for diagnostics.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.cookies.keys()).finish()
    }
}

/// Parse `name=value; Path=/; Max-Age=0` into `(name, value, expired)`.
pub fn parse_set_cookie(header: &str) -> Option<(String, String, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let expired = parts.any(|attr| {
        let attr = attr.trim().to_ascii_lowercase();
        attr == "max-age=0" || attr.starts_with("max-age=-")
    });

    Some((name.to_string(), value.to_string(), expired))
}
