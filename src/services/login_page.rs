// src/services/login_page.rs

//! Login page recognition.
//!
//! Reads a probed page and reports what it says about authentication:
//! a password form (with its action and field names), an HTTP 401,
//! a pointer at the HNAP endpoint, or plain data.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::utils::http::{HttpResponse, path_and_query};
use crate::utils::{is_hnap_path, resolve_device_path};

static PASSWORD_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input[^>]*\btype\s*=\s*["']?password\b"#).expect("valid regex")
});

static REALM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)realm\s*=\s*"([^"]*)""#).expect("valid regex"));

/// Whether a body is a login page rather than data.
///
/// A password input is the one marker every login page shares; data pages
/// never carry one.
pub fn looks_like_login_page(body: &str) -> bool {
    PASSWORD_INPUT_RE.is_match(body)
}

/// Structure of a login form as served by the device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormEvidence {
    /// Device-local path the form posts to; `None` when the form has no
    /// action or the password field sits outside any form.
    pub action: Option<String>,
    pub method: String,
    pub username_field: Option<String>,
    pub password_field: String,
    pub hidden_fields: BTreeMap<String, String>,
}

fn input_type(input: &ElementRef<'_>) -> String {
    input
        .value()
        .attr("type")
        .unwrap_or("text")
        .trim()
        .to_ascii_lowercase()
}

fn input_name(input: &ElementRef<'_>) -> Option<String> {
    input
        .value()
        .attr("name")
        .or_else(|| input.value().attr("id"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn collect_inputs<'a>(inputs: impl Iterator<Item = ElementRef<'a>>) -> Option<FormEvidence> {
    let mut evidence = FormEvidence {
        method: "post".to_string(),
        ..FormEvidence::default()
    };
    let mut password = None;

    for input in inputs {
        let Some(name) = input_name(&input) else {
            continue;
        };
        match input_type(&input).as_str() {
            "password" if password.is_none() => password = Some(name),
            "text" | "email" if evidence.username_field.is_none() => {
                evidence.username_field = Some(name)
            }
            "hidden" => {
                let value = input.value().attr("value").unwrap_or_default();
                evidence.hidden_fields.insert(name, value.to_string());
            }
            _ => {}
        }
    }

    evidence.password_field = password?;
    Some(evidence)
}

/// Find the login form on a page.
///
/// The first `<form>` holding a password input wins. Pages that build the
/// form in script still get field names from loose inputs, with no action.
pub fn find_login_form(page_url: &Url, html: &str) -> Option<FormEvidence> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input").ok()?;

    for form in document.select(&form_selector) {
        if let Some(mut evidence) = collect_inputs(form.select(&input_selector)) {
            evidence.action = form
                .value()
                .attr("action")
                .and_then(|action| resolve_device_path(page_url, action));
            if let Some(method) = form.value().attr("method") {
                evidence.method = method.trim().to_ascii_lowercase();
            }
            return Some(evidence);
        }
    }

    collect_inputs(document.select(&input_selector))
}

/// What one probe response says about authentication.
#[derive(Debug, Clone, Default)]
pub struct PageEvidence {
    pub status: u16,
    /// Path of the page finally served, after redirects.
    pub final_path: String,
    /// Redirect hops taken to reach it.
    pub redirects: Vec<String>,
    pub unauthorized: bool,
    pub realm: Option<String>,
    pub form: Option<FormEvidence>,
    /// The page lives at, or refers to, the HNAP endpoint.
    pub hnap: bool,
}

impl PageEvidence {
    pub fn is_login_page(&self) -> bool {
        self.form.is_some()
    }

    /// Served data with no sign of authentication.
    pub fn is_data_page(&self) -> bool {
        (200..300).contains(&self.status) && !self.unauthorized && self.form.is_none() && !self.hnap
    }
}

/// Classify a probe response.
pub fn inspect(response: &HttpResponse) -> PageEvidence {
    let final_path = path_and_query(&response.url);
    let redirects: Vec<String> = response.redirects.iter().map(path_and_query).collect();
    let realm = response
        .header("www-authenticate")
        .and_then(|value| REALM_RE.captures(value))
        .map(|caps| caps[1].to_string());
    let hnap = is_hnap_path(&final_path)
        || redirects.iter().any(|path| is_hnap_path(path))
        || is_hnap_path(&response.body);
    let form = if looks_like_login_page(&response.body) {
        find_login_form(&response.url, &response.body)
    } else {
        None
    };

    PageEvidence {
        status: response.status,
        final_path,
        redirects,
        unauthorized: response.is_unauthorized(),
        realm,
        form,
        hnap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("http://192.168.100.1/login.html").unwrap()
    }

    fn response(status: u16, url: &str, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            url: Url::parse(url).unwrap(),
            headers: Vec::new(),
            body: body.to_string(),
            redirects: Vec::new(),
        }
    }

    #[test]
    fn test_looks_like_login_page() {
        assert!(looks_like_login_page(r#"<input type="password" name="pw">"#));
        assert!(looks_like_login_page("<INPUT name=pw TYPE=Password>"));
        assert!(!looks_like_login_page("<table><tr><td>password reset done</td></tr></table>"));
        assert!(!looks_like_login_page(""));
    }

    #[test]
    fn test_find_login_form() {
        let html = r#"<form action="../goform/login" method="POST">
            <input type="hidden" name="token" value="t1">
            <input name="loginUsername">
            <input type="password" name="loginPassword">
            <input type="submit" value="Login">
        </form>"#;
        let evidence = find_login_form(&page(), html).unwrap();
        assert_eq!(evidence.action.as_deref(), Some("/goform/login"));
        assert_eq!(evidence.method, "post");
        assert_eq!(evidence.username_field.as_deref(), Some("loginUsername"));
        assert_eq!(evidence.password_field, "loginPassword");
        assert_eq!(evidence.hidden_fields["token"], "t1");
    }

    #[test]
    fn test_skips_forms_without_password() {
        let html = r#"<form action="/search"><input name="q"></form>
            <form action="/cgi-bin/login"><input type="password" id="pwd"></form>"#;
        let evidence = find_login_form(&page(), html).unwrap();
        assert_eq!(evidence.action.as_deref(), Some("/cgi-bin/login"));
        assert_eq!(evidence.password_field, "pwd");
        assert_eq!(evidence.username_field, None);
    }

    #[test]
    fn test_loose_inputs_without_form() {
        let html = r#"<div><input id="username" type="text"><input id="password" type="password"></div>"#;
        let evidence = find_login_form(&page(), html).unwrap();
        assert_eq!(evidence.action, None);
        assert_eq!(evidence.username_field.as_deref(), Some("username"));
    }

    #[test]
    fn test_inspect_unauthorized() {
        let mut resp = response(401, "http://192.168.100.1/", "Unauthorized");
        resp.headers
            .push(("WWW-Authenticate".into(), "Basic realm=\"NETGEAR CM600\"".into()));
        let evidence = inspect(&resp);
        assert!(evidence.unauthorized);
        assert_eq!(evidence.realm.as_deref(), Some("NETGEAR CM600"));
        assert!(evidence.form.is_none());
        assert!(!evidence.is_data_page());
    }

    #[test]
    fn test_inspect_hnap_reference() {
        let body = r#"<script src="/js/SOAP/SOAPAction.js"></script><script>var url = "/HNAP1/";</script>"#;
        let evidence = inspect(&response(200, "http://192.168.100.1/Login.html", body));
        assert!(evidence.hnap);
    }

    #[test]
    fn test_inspect_data_page() {
        let evidence = inspect(&response(
            200,
            "http://192.168.100.1/cmSignalData.htm",
            "<table><tr><td>Downstream</td></tr></table>",
        ));
        assert!(evidence.is_data_page());
        assert_eq!(evidence.final_path, "/cmSignalData.htm");
    }
}
