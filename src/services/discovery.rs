// src/services/discovery.rs

//! Discovery engine.
//!
//! Probes a target anonymously, reads the page for authentication
//! evidence, plans the strategies worth trying, and returns the first one
//! that logs in and serves data. Live markup beats hints.

use crate::auth::{Session, strategy_for_config};
use crate::error::{AppError, AuthFailureKind, Result};
use crate::hnap::HnapBatchResponse;
use crate::hnap::constants::result;
use crate::models::{
    AuthConfig, BasicHeaderConfig, CandidateMatch, Config, Credentials, DiscoveryConfig,
    DiscoveryHints, DiscoverySignal, FormConfig, HnapConfig, SignalKind, StrategyKind,
};
use crate::services::candidates::CandidateMatcher;
use crate::services::login_page::{FormEvidence, PageEvidence, inspect, looks_like_login_page};
use crate::utils::cookies::CookieJar;
use crate::utils::http::{DeviceClient, HttpRequest, HttpResponse};
use crate::utils::normalize_path;

/// A validated strategy with its live session.
#[derive(Debug)]
pub struct Discovery {
    pub config: AuthConfig,
    pub session: Session,
    /// Every observation made, in order.
    pub signals: Vec<DiscoverySignal>,
    pub candidates: Vec<CandidateMatch>,
    /// Resources the session was validated against.
    pub data_paths: Vec<String>,
}

struct Probe {
    path: String,
    response: HttpResponse,
}

enum Attempt {
    Validated(AuthConfig, Session),
    Rejected,
}

/// Service for finding a working authentication strategy.
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    matcher: CandidateMatcher,
}

/// Field names and action from live markup, on top of whatever the hint
/// or profile said.
pub fn form_from_evidence(
    evidence: &FormEvidence,
    base: Option<FormConfig>,
    page_path: &str,
) -> FormConfig {
    let mut form = base.unwrap_or_else(|| FormConfig::new(page_path));
    form.login_page = page_path.to_string();
    if let Some(action) = &evidence.action {
        form.action = action.clone();
    }
    if let Some(username) = &evidence.username_field {
        form.username_field = username.clone();
    }
    form.password_field = evidence.password_field.clone();
    // Hidden inputs are usually per-session tokens: re-read them each login.
    if !evidence.hidden_fields.is_empty() {
        form.refresh_form = true;
    }
    form
}

fn hinted(
    kind: StrategyKind,
    hints: &DiscoveryHints,
    candidates: &[CandidateMatch],
) -> Option<AuthConfig> {
    hints
        .auth
        .iter()
        .chain(candidates.iter().map(CandidateMatch::auth))
        .find(|config| config.kind() == kind)
        .cloned()
}

/// Candidate strategies, most likely first.
pub fn plan_strategies(
    evidence: &PageEvidence,
    hints: &DiscoveryHints,
    candidates: &[CandidateMatch],
) -> Vec<AuthConfig> {
    let mut plan = Vec::new();

    if evidence.hnap {
        plan.push(
            hinted(StrategyKind::Hnap, hints, candidates)
                .unwrap_or_else(|| AuthConfig::Hnap(HnapConfig::default())),
        );
    }

    if let Some(form) = &evidence.form {
        if form.action.is_none() {
            if let Some(token) = hinted(StrategyKind::UrlToken, hints, candidates) {
                plan.push(token);
            }
        }
        let base = match hinted(StrategyKind::Form, hints, candidates) {
            Some(AuthConfig::Form(base)) => Some(base),
            _ => None,
        };
        plan.push(AuthConfig::Form(form_from_evidence(
            form,
            base,
            &evidence.final_path,
        )));
    } else if evidence.unauthorized {
        plan.push(AuthConfig::BasicHeader(BasicHeaderConfig {
            realm: evidence.realm.clone(),
        }));
    }

    if evidence.is_data_page() {
        plan.push(AuthConfig::None);
    }

    let fallback = hints
        .auth
        .clone()
        .or_else(|| candidates.first().map(|c| c.auth().clone()));
    if let Some(fallback) = fallback {
        if !plan.iter().any(|config| config.kind() == fallback.kind()) {
            plan.push(fallback);
        }
    }

    if plan.is_empty() {
        plan.push(AuthConfig::None);
    }
    plan
}

/// Resources to validate and poll for one planned strategy.
fn data_paths_for(
    config: &AuthConfig,
    hints: &DiscoveryHints,
    candidates: &[CandidateMatch],
    probe_path: &str,
) -> Vec<String> {
    if !hints.data_paths.is_empty() {
        return hints.data_paths.iter().map(|p| normalize_path(p)).collect();
    }
    let from_profile = candidates
        .iter()
        .find(|c| c.auth().kind() == config.kind() && !c.profile.data_paths.is_empty())
        .map(|c| c.profile.data_paths.clone());
    match (from_profile, config) {
        (Some(paths), _) => paths,
        (None, AuthConfig::Hnap(_)) => Vec::new(),
        (None, _) => vec![probe_path.to_string()],
    }
}

fn record_evidence(evidence: &PageEvidence, signals: &mut Vec<DiscoverySignal>) {
    let source = evidence.final_path.as_str();
    for hop in &evidence.redirects {
        signals.push(DiscoverySignal::new(
            SignalKind::Network,
            format!("redirected to {hop}"),
            0.6,
            "probe",
        ));
    }
    if evidence.hnap {
        signals.push(DiscoverySignal::new(SignalKind::Paradigm, "hnap", 0.9, source));
    }
    if let Some(form) = &evidence.form {
        signals.push(DiscoverySignal::new(
            SignalKind::Paradigm,
            "html-login-form",
            0.9,
            source,
        ));
        signals.push(DiscoverySignal::new(
            SignalKind::FormEvidence,
            format!("form action {}", form.action.as_deref().unwrap_or("<none>")),
            0.9,
            source,
        ));
        if let Some(username) = &form.username_field {
            signals.push(DiscoverySignal::new(
                SignalKind::FormEvidence,
                format!("username input {username}"),
                0.8,
                source,
            ));
        }
        signals.push(DiscoverySignal::new(
            SignalKind::FormEvidence,
            format!("password input {}", form.password_field),
            0.9,
            source,
        ));
        if !form.hidden_fields.is_empty() {
            let names: Vec<&str> = form.hidden_fields.keys().map(String::as_str).collect();
            signals.push(DiscoverySignal::new(
                SignalKind::FormEvidence,
                format!("hidden inputs {}", names.join(",")),
                0.7,
                source,
            ));
        }
    }
    if evidence.unauthorized {
        signals.push(DiscoverySignal::new(SignalKind::Paradigm, "http-401", 1.0, source));
        if let Some(realm) = &evidence.realm {
            signals.push(DiscoverySignal::new(
                SignalKind::Network,
                format!("realm={realm}"),
                0.8,
                source,
            ));
        }
    }
    if evidence.is_data_page() {
        signals.push(DiscoverySignal::new(SignalKind::Paradigm, "data-page", 0.7, source));
    }
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig) -> Self {
        let matcher = CandidateMatcher::new(config.profiles.clone());
        Self { config, matcher }
    }

    /// Find and validate the target's authentication strategy.
    pub async fn discover(
        &self,
        client: &DeviceClient,
        credentials: Option<&Credentials>,
        hints: &DiscoveryHints,
    ) -> Result<Discovery> {
        let mut signals = Vec::new();
        let probe = self.probe(client, hints, &mut signals).await?;

        let evidence = inspect(&probe.response);
        record_evidence(&evidence, &mut signals);

        let candidates = self.matcher.rank(&evidence, &probe.response.body, hints);
        for candidate in candidates.iter().take(3) {
            signals.push(DiscoverySignal::new(
                SignalKind::ModelHint,
                &candidate.profile.name,
                candidate.score,
                candidate.matching.join("; "),
            ));
        }

        let plan = plan_strategies(&evidence, hints, &candidates);
        log::info!(
            "Discovery plan for {}: {}",
            client.base(),
            plan.iter()
                .map(|config| config.kind().tag())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for (rank, config) in plan.into_iter().enumerate() {
            signals.push(DiscoverySignal::new(
                SignalKind::AuthKind,
                config.kind().tag(),
                (0.9 - rank as f32 * 0.2).max(0.1),
                "plan",
            ));
            let data_paths = data_paths_for(&config, hints, &candidates, &probe.path);
            match self
                .attempt(client, credentials, config, &data_paths, &mut signals)
                .await?
            {
                Attempt::Validated(config, session) => {
                    log::info!(
                        "Discovered {} for {}",
                        strategy_for_config(&config).describe(&config),
                        client.base()
                    );
                    return Ok(Discovery {
                        config,
                        session,
                        signals,
                        candidates,
                        data_paths,
                    });
                }
                Attempt::Rejected => continue,
            }
        }

        log::warn!(
            "No authentication strategy worked for {} ({} signals)",
            client.base(),
            signals.len()
        );
        Err(AppError::NoMatchingStrategy { signals })
    }

    /// Anonymous GET of the hinted path, else each configured probe path
    /// until one answers.
    async fn probe(
        &self,
        client: &DeviceClient,
        hints: &DiscoveryHints,
        signals: &mut Vec<DiscoverySignal>,
    ) -> Result<Probe> {
        let paths: Vec<String> = match &hints.probe_path {
            Some(path) => vec![normalize_path(path)],
            None => self.config.probe_paths.iter().map(|p| normalize_path(p)).collect(),
        };

        let mut last_error = AppError::config("no probe paths configured");
        for path in paths {
            let mut jar = CookieJar::new();
            match client.execute(HttpRequest::get(client.url(&path)?), &mut jar).await {
                Ok(response) => {
                    signals.push(DiscoverySignal::new(
                        SignalKind::Network,
                        format!("GET {} -> {}", path, response.status),
                        1.0,
                        "probe",
                    ));
                    return Ok(Probe { path, response });
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(error) => {
                    log::info!("Probe of {} failed: {}", path, error);
                    signals.push(DiscoverySignal::new(
                        SignalKind::Network,
                        format!("GET {} failed: {}", path, error),
                        1.0,
                        "probe",
                    ));
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    /// Log in with one planned strategy and confirm the data fetch is not
    /// a login page. Lockout and reboot-required end discovery.
    async fn attempt(
        &self,
        client: &DeviceClient,
        credentials: Option<&Credentials>,
        mut config: AuthConfig,
        data_paths: &[String],
        signals: &mut Vec<DiscoverySignal>,
    ) -> Result<Attempt> {
        let kind = config.kind();
        let strategy = strategy_for_config(&config);

        if kind.requires_credentials() && credentials.is_none() {
            signals.push(DiscoverySignal::new(
                SignalKind::Validation,
                format!("{kind} needs credentials, none supplied"),
                1.0,
                "discovery",
            ));
            return Ok(Attempt::Rejected);
        }

        let mut session = Session::new();
        let outcome = match strategy.login(client, &mut session, credentials, &config).await {
            Ok(outcome) => outcome,
            Err(error @ (AppError::Connectivity(_) | AppError::Cancelled)) => return Err(error),
            Err(error) => {
                signals.push(DiscoverySignal::new(
                    SignalKind::Validation,
                    format!("{kind} login failed: {error}"),
                    0.8,
                    "login",
                ));
                return Ok(Attempt::Rejected);
            }
        };

        if let Some(algorithm) = outcome.negotiated {
            config.record_negotiated_algorithm(algorithm);
            signals.push(DiscoverySignal::new(
                SignalKind::Validation,
                format!("negotiated {algorithm}"),
                1.0,
                "login",
            ));
        }
        if !outcome.ok {
            let failure = outcome
                .failure
                .unwrap_or(AuthFailureKind::InvalidCredentials);
            return self.rejected(kind, failure, signals);
        }

        let needs_actions = data_paths.is_empty()
            && matches!(&config, AuthConfig::Hnap(hnap) if hnap.data_actions.is_empty());
        if needs_actions {
            match self
                .hnap_action_set(client, &mut session, &config, signals)
                .await?
            {
                Some(actions) => {
                    if let AuthConfig::Hnap(hnap) = &mut config {
                        hnap.data_actions = actions;
                    }
                }
                None => {
                    signals.push(DiscoverySignal::new(
                        SignalKind::Validation,
                        "hnap login accepted but no known action set answered",
                        0.9,
                        "confirm",
                    ));
                    return Ok(Attempt::Rejected);
                }
            }
        }

        match strategy.fetch(client, &mut session, &config, data_paths).await {
            Ok(bodies) => {
                let stale = bodies.iter().find(|raw| {
                    raw.status >= 400
                        || strategy.is_expired(raw, &config)
                        || looks_like_login_page(&raw.body)
                });
                if let Some(raw) = stale {
                    signals.push(DiscoverySignal::new(
                        SignalKind::Validation,
                        format!(
                            "{kind} login accepted but {} still served a login page (status {})",
                            raw.resource, raw.status
                        ),
                        0.9,
                        "confirm",
                    ));
                    return Ok(Attempt::Rejected);
                }
            }
            Err(error @ (AppError::Connectivity(_) | AppError::Cancelled)) => {
                return Err(error);
            }
            Err(AppError::Authentication { kind: failure }) => {
                return self.rejected(kind, failure, signals);
            }
            Err(error) => {
                signals.push(DiscoverySignal::new(
                    SignalKind::Validation,
                    format!("{kind} data fetch failed: {error}"),
                    0.8,
                    "confirm",
                ));
                return Ok(Attempt::Rejected);
            }
        }

        signals.push(DiscoverySignal::new(
            SignalKind::Validation,
            format!("validated {}", strategy.describe(&config)),
            1.0,
            "confirm",
        ));
        Ok(Attempt::Validated(config, session))
    }

    /// First data action set from the known HNAP profiles that the device
    /// answers with `OK`.
    async fn hnap_action_set(
        &self,
        client: &DeviceClient,
        session: &mut Session,
        config: &AuthConfig,
        signals: &mut Vec<DiscoverySignal>,
    ) -> Result<Option<Vec<String>>> {
        let AuthConfig::Hnap(base) = config else {
            return Ok(None);
        };
        let mut tried: Vec<&Vec<String>> = Vec::new();
        for profile in &self.config.profiles {
            let AuthConfig::Hnap(known) = &profile.auth else {
                continue;
            };
            if known.data_actions.is_empty() || tried.contains(&&known.data_actions) {
                continue;
            }
            tried.push(&known.data_actions);

            let trial = AuthConfig::Hnap(HnapConfig {
                data_actions: known.data_actions.clone(),
                ..base.clone()
            });
            let strategy = strategy_for_config(&trial);
            let bodies = match strategy.fetch(client, session, &trial, &[]).await {
                Ok(bodies) => bodies,
                Err(error @ (AppError::Connectivity(_) | AppError::Cancelled)) => {
                    return Err(error);
                }
                Err(error) => {
                    log::debug!("HNAP actions of {} failed: {}", profile.name, error);
                    continue;
                }
            };
            let answered = bodies.iter().all(|raw| {
                raw.status < 400
                    && !strategy.is_expired(raw, &trial)
                    && HnapBatchResponse::parse(&raw.body).is_ok_and(|batch| {
                        known
                            .data_actions
                            .iter()
                            .any(|action| batch.action_result(action) == Some(result::OK))
                    })
            });
            if answered {
                signals.push(DiscoverySignal::new(
                    SignalKind::Validation,
                    format!("hnap actions of {} answered", profile.name),
                    0.8,
                    "confirm",
                ));
                return Ok(Some(known.data_actions.clone()));
            }
        }
        Ok(None)
    }

    fn rejected(
        &self,
        kind: StrategyKind,
        failure: AuthFailureKind,
        signals: &mut Vec<DiscoverySignal>,
    ) -> Result<Attempt> {
        signals.push(DiscoverySignal::new(
            SignalKind::Validation,
            format!("{kind} login rejected: {failure}"),
            0.9,
            "login",
        ));
        match failure {
            AuthFailureKind::LockedOut | AuthFailureKind::RebootRequired => {
                log::warn!("Discovery stopped: {}", failure);
                Err(AppError::auth(failure))
            }
            _ => Ok(Attempt::Rejected),
        }
    }
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

/// Discover a target by address with the configured HTTP settings.
pub async fn discover(
    address: &str,
    credentials: Option<&Credentials>,
    hints: &DiscoveryHints,
    config: &Config,
) -> Result<(DeviceClient, Discovery)> {
    let client = DeviceClient::connect(address, &config.http)?;
    let discovery = DiscoveryEngine::new(config.discovery.clone())
        .discover(&client, credentials, hints)
        .await?;
    Ok((client, discovery))
}
