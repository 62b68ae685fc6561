// src/auth/form.rs

//! URL-encoded form login.
//!
//! Variants differ in how the password goes on the wire (plain, base64,
//! base64 with a client nonce) and in whether the form is re-read from the
//! live login page right before submitting (dynamic).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use rand::distributions::Alphanumeric;
use url::form_urlencoded;

use crate::auth::{AuthStrategy, LoginOutcome, Session, mismatched, require_credentials};
use crate::error::{AppError, AuthFailureKind, Result};
use crate::models::{AuthConfig, Credentials, FormConfig, PasswordEncoding, StrategyKind, SuccessCheck};
use crate::services::login_page::{find_login_form, looks_like_login_page};
use crate::utils::http::{CONTENT_TYPE_FORM, DeviceClient, HttpRequest, HttpResponse};

#[derive(Debug, Clone, Copy, Default)]
pub struct FormAuth;

fn client_nonce(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Password field value, plus the nonce field when the encoding needs one.
fn encode_password(form: &FormConfig, password: &str) -> (String, Option<String>) {
    match form.encoding {
        PasswordEncoding::Plain => (password.to_string(), None),
        PasswordEncoding::Base64 => (STANDARD.encode(password), None),
        PasswordEncoding::Nonce => {
            let nonce = client_nonce(form.nonce_length);
            (STANDARD.encode(format!("{password}{nonce}")), Some(nonce))
        }
    }
}

/// URL-encoded submit body. Hidden fields go first, as browsers send them.
fn submission(form: &FormConfig, credentials: &Credentials) -> String {
    let (password, nonce) = encode_password(form, credentials.password());
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in &form.hidden_fields {
        serializer.append_pair(name, value);
    }
    if !form.username_field.is_empty() {
        serializer.append_pair(&form.username_field, credentials.username());
    }
    serializer.append_pair(&form.password_field, &password);
    if let Some(nonce) = nonce {
        serializer.append_pair(&form.nonce_field, &nonce);
    }
    serializer.finish()
}

impl FormAuth {
    /// Re-read action and field names from the live login page.
    async fn refresh(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        form: &FormConfig,
    ) -> Result<FormConfig> {
        let page = session
            .send(client, HttpRequest::get(client.url(&form.login_page)?))
            .await?;
        let evidence = find_login_form(&page.url, &page.body).ok_or_else(|| {
            AppError::protocol(format!("no login form found at {}", form.login_page))
        })?;

        let mut live = form.clone();
        if let Some(action) = evidence.action {
            live.action = action;
        }
        if let Some(username) = evidence.username_field {
            live.username_field = username;
        }
        live.password_field = evidence.password_field;
        live.hidden_fields.extend(evidence.hidden_fields);
        log::debug!(
            "Refreshed login form: action={} user_field={} password_field={}",
            live.action,
            live.username_field,
            live.password_field
        );
        Ok(live)
    }

    /// Apply the configured success check to the submit response.
    async fn accepted(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        form: &FormConfig,
        response: &HttpResponse,
    ) -> Result<(bool, String)> {
        match &form.success {
            SuccessCheck::RedirectContains(pattern) => {
                let target = response.redirect_target().unwrap_or_default();
                Ok((target.contains(pattern.as_str()), response.body.clone()))
            }
            SuccessCheck::BodyContains(pattern) => {
                Ok((response.body.contains(pattern.as_str()), response.body.clone()))
            }
            SuccessCheck::NotLoginPage => {
                let landing = match response.location() {
                    Some(location) if response.is_redirect() => {
                        let url = response.url.join(location)?;
                        session.send(client, HttpRequest::get(url)).await?
                    }
                    _ => response.clone(),
                };
                let ok = landing.is_success() && !looks_like_login_page(&landing.body);
                Ok((ok, landing.body))
            }
        }
    }
}

#[async_trait]
impl AuthStrategy for FormAuth {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Form
    }

    async fn login(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        credentials: Option<&Credentials>,
        config: &AuthConfig,
    ) -> Result<LoginOutcome> {
        let AuthConfig::Form(form) = config else {
            return Err(mismatched(StrategyKind::Form, config));
        };
        let credentials = match require_credentials(credentials) {
            Ok(credentials) => credentials,
            Err(outcome) => return Ok(outcome),
        };

        let form = if form.refresh_form {
            self.refresh(client, session, form).await?
        } else {
            form.clone()
        };

        client.ensure_active()?;
        let request = HttpRequest::post(
            client.url(&form.action)?,
            CONTENT_TYPE_FORM,
            submission(&form, credentials),
        )
        .no_redirects();
        let response = session.send(client, request).await?;

        if matches!(response.status, 401 | 403) {
            return Ok(LoginOutcome::rejected(
                AuthFailureKind::InvalidCredentials,
                Some(response.body),
            ));
        }

        let (ok, body) = self.accepted(client, session, &form, &response).await?;
        if ok {
            session.mark_authenticated();
            log::info!("Form login accepted by {}", form.action);
            Ok(LoginOutcome::success(Some(body)))
        } else {
            log::info!("Form login rejected by {} (status {})", form.action, response.status);
            Ok(LoginOutcome::rejected(
                AuthFailureKind::InvalidCredentials,
                Some(body),
            ))
        }
    }

    fn looks_expired(&self, body: &str, _config: &AuthConfig) -> bool {
        looks_like_login_page(body)
    }

    fn describe(&self, config: &AuthConfig) -> String {
        match config {
            AuthConfig::Form(form) => format!(
                "form login ({}) posting {}/{} to {}",
                form.variant().as_str(),
                form.username_field,
                form.password_field,
                form.action
            ),
            other => format!("form login (unexpected {} config)", other.kind()),
        }
    }
}
