//! Utility functions and helpers.

pub mod cookies;
pub mod http;
pub mod redact;

use url::Url;

/// Resolve a potentially relative href against a page URL, returning the
/// device-local `path?query` when the result stays on the same host.
///
/// Form actions and redirect targets on device pages are usually relative;
/// requests are always re-issued against the configured device address.
pub fn resolve_device_path(page: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    let resolved = page.join(href).ok()?;
    if resolved.host_str() != page.host_str() {
        return None;
    }
    Some(http::path_and_query(&resolved))
}

/// Whether a path looks like part of the HNAP endpoint family.
pub fn is_hnap_path(path: &str) -> bool {
    path.to_ascii_uppercase().contains("HNAP1")
}

/// Ensure a configured path starts with `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
