// src/utils/http.rs

//! HTTP client utilities.
//!
//! The `Transport` trait is the seam between device logic and the network.
//! `DeviceClient` wraps a transport with the per-call timeout, manual
//! redirect handling, cookie bookkeeping and cooperative cancellation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;
use crate::utils::cookies::CookieJar;
use crate::utils::redact::redact_text;

pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP method used against device web servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outbound request.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
        }
    }

    pub fn post(url: Url, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: Some(body.into()),
            follow_redirects: true,
        }
    }

    /// Add a header, replacing any existing header with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Return the redirect response itself instead of following it.
    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    pub fn path_and_query(&self) -> String {
        path_and_query(&self.url)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &redact_text(self.url.as_str()))
            .field(
                "headers",
                &self
                    .headers
                    .iter()
                    .map(|(n, v)| format!("{n}: {}", crate::utils::redact::redact_field(n, v)))
                    .collect::<Vec<_>>(),
            )
            .field("body", &self.body.as_deref().map(redact_text))
            .finish()
    }
}

/// A response as seen by device logic.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after any followed redirects.
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Locations followed to reach this response, in order.
    pub redirects: Vec<Url>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Location of a redirect, or the last followed redirect, if any.
    pub fn redirect_target(&self) -> Option<String> {
        if self.is_redirect() {
            return self.location().map(str::to_string);
        }
        self.redirects.last().map(path_and_query)
    }
}

/// Network seam. Implemented over reqwest in production and by scripted
/// fakes in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Must not follow redirects.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a configured asynchronous HTTP transport.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
            redirects: Vec::new(),
        })
    }
}

/// Turn a bare address (`192.168.100.1`, `https://modem:8443/x`) into a
/// base URL rooted at `/`.
pub fn normalize_address(address: &str) -> Result<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("device address is empty"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let mut url = Url::parse(&with_scheme)?;
    if url.host_str().is_none() {
        return Err(AppError::validation(format!("address has no host: {address}")));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// `path?query` of a URL.
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Client bound to one device address.
#[derive(Clone)]
pub struct DeviceClient {
    base: Url,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    max_redirects: usize,
    cancel: CancellationToken,
}

impl DeviceClient {
    pub fn new(base: Url, transport: Arc<dyn Transport>, config: &HttpConfig) -> Self {
        Self {
            base,
            transport,
            timeout: Duration::from_secs(config.timeout_secs),
            max_redirects: config.max_redirects,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a client for `address` over the reqwest transport.
    pub fn connect(address: &str, config: &HttpConfig) -> Result<Self> {
        let base = normalize_address(address)?;
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::new(base, transport, config))
    }

    /// Use `token` to abort in-flight and future calls.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a device path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Fail fast if the current cycle has been cancelled.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    /// Send exactly one request, bounded by the timeout and the cancellation token.
    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.transport.send(request)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(AppError::connectivity(format!(
                        "{} {} timed out after {}s",
                        request.method,
                        redact_text(&request.path_and_query()),
                        self.timeout.as_secs()
                    ))),
                }
            }
        }
    }

    /// Send a request, replaying and collecting cookies through `jar` and
    /// following redirects when the request allows it.
    pub async fn execute(&self, request: HttpRequest, jar: &mut CookieJar) -> Result<HttpResponse> {
        let mut request = request;
        let mut redirects = Vec::new();

        loop {
            self.ensure_active()?;
            match jar.header_value() {
                Some(cookie) => request.set_header("Cookie", cookie),
                None => request.headers.retain(|(n, _)| !n.eq_ignore_ascii_case("cookie")),
            }

            log::debug!(
                "{} {}",
                request.method,
                redact_text(&request.path_and_query())
            );
            let mut response = self.send_once(&request).await?;
            for value in response.header_all("set-cookie") {
                jar.absorb_set_cookie(value);
            }
            log::debug!(
                "{} {} -> {}",
                request.method,
                redact_text(&request.path_and_query()),
                response.status
            );

            if !(request.follow_redirects && response.is_redirect()) {
                response.redirects = redirects;
                return Ok(response);
            }
            let Some(location) = response.location() else {
                response.redirects = redirects;
                return Ok(response);
            };
            if redirects.len() >= self.max_redirects {
                return Err(AppError::protocol(format!(
                    "too many redirects starting at {}",
                    redact_text(&request.path_and_query())
                )));
            }

            let next = request.url.join(location)?;
            // Session headers and cookies never leave the device's origin.
            if next.origin() != request.url.origin() {
                log::warn!(
                    "Not following redirect from {} to another origin ({})",
                    redact_text(&request.path_and_query()),
                    next.host_str().unwrap_or("?")
                );
                response.redirects = redirects;
                return Ok(response);
            }
            redirects.push(next.clone());
            let keep_method = matches!(response.status, 307 | 308);
            request = HttpRequest {
                method: if keep_method { request.method } else { Method::Get },
                url: next,
                headers: request
                    .headers
                    .into_iter()
                    .filter(|(n, _)| keep_method || !n.eq_ignore_ascii_case("content-type"))
                    .collect(),
                body: if keep_method { request.body } else { None },
                follow_redirects: true,
            };
        }
    }
}

impl fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport for unit tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// A canned reply.
    #[derive(Debug, Clone)]
    pub enum Canned {
        Reply {
            status: u16,
            headers: Vec<(String, String)>,
            body: String,
        },
        Refused,
        Hang,
    }

    impl Canned {
        pub fn ok(body: impl Into<String>) -> Self {
            Self::status(200, body)
        }

        pub fn status(status: u16, body: impl Into<String>) -> Self {
            Canned::Reply {
                status,
                headers: Vec::new(),
                body: body.into(),
            }
        }

        pub fn redirect(location: &str) -> Self {
            Self::status(302, "").with_header("Location", location)
        }

        pub fn with_header(self, name: &str, value: &str) -> Self {
            match self {
                Canned::Reply {
                    status,
                    mut headers,
                    body,
                } => {
                    headers.push((name.to_string(), value.to_string()));
                    Canned::Reply {
                        status,
                        headers,
                        body,
                    }
                }
                other => other,
            }
        }
    }

    /// One observed request.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub method: Method,
        pub path: String,
        pub headers: Vec<(String, String)>,
        pub body: Option<String>,
    }

    impl RecordedCall {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Transport that replays queued replies per `METHOD path[?query]`.
    ///
    /// The last reply queued for a route repeats once the queue drains.
    /// Unknown routes answer 404.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<HashMap<String, VecDeque<Canned>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, method: Method, path: &str, reply: Canned) -> Self {
            self.push(method, path, reply);
            self
        }

        pub fn push(&self, method: Method, path: &str, reply: Canned) {
            let key = format!("{} {}", method, path);
            self.routes
                .lock()
                .unwrap()
                .entry(key)
                .or_default()
                .push_back(reply);
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_to(&self, path: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.path == path || c.path.split('?').next() == Some(path))
                .count()
        }

        fn next_reply(&self, method: Method, full_path: &str, path: &str) -> Option<Canned> {
            let mut routes = self.routes.lock().unwrap();
            for key in [format!("{method} {full_path}"), format!("{method} {path}")] {
                if let Some(queue) = routes.get_mut(&key) {
                    let reply = if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    };
                    if reply.is_some() {
                        return reply;
                    }
                }
            }
            None
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            let full_path = request.path_and_query();
            self.calls.lock().unwrap().push(RecordedCall {
                method: request.method,
                path: full_path.clone(),
                headers: request.headers.clone(),
                body: request.body.clone(),
            });

            let reply = self
                .next_reply(request.method, &full_path, request.url.path())
                .unwrap_or_else(|| Canned::status(404, "not found"));

            match reply {
                Canned::Reply {
                    status,
                    headers,
                    body,
                } => Ok(HttpResponse {
                    status,
                    url: request.url.clone(),
                    headers,
                    body,
                    redirects: Vec::new(),
                }),
                Canned::Refused => Err(AppError::connectivity("connection refused")),
                Canned::Hang => {
                    std::future::pending::<()>().await;
                    Err(AppError::connectivity("unreachable"))
                }
            }
        }
    }

    pub fn client(transport: Arc<ScriptedTransport>) -> DeviceClient {
        let base = Url::parse("http://device.test/").unwrap();
        DeviceClient::new(base, transport, &HttpConfig::default())
    }
}
