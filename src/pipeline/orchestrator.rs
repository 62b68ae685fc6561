//! Data Orchestrator.
//!
//! Runs one poll cycle for one target: log in if the session is not
//! usable, fetch, and on an expired-looking response log in again and
//! fetch once more. The orchestrator owns the target's config, session and
//! circuit breaker; callers serialize on `&mut self`.

use serde::Serialize;

use crate::auth::{AuthStrategy, Session, strategy_for_config};
use crate::error::{AppError, AuthFailureKind, Result};
use crate::models::{AuthConfig, CircuitConfig, Credentials, PollData, RawBody};
use crate::pipeline::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::pipeline::extract::{ExtractorSelection, ExtractorSet, Records};
use crate::services::Discovery;
use crate::utils::http::DeviceClient;

/// Config, strategy and session, replaced together.
#[derive(Debug)]
pub struct TargetState {
    config: AuthConfig,
    strategy: Box<dyn AuthStrategy>,
    session: Session,
    resources: Vec<String>,
}

impl TargetState {
    /// Fresh state with no session yet.
    pub fn new(config: AuthConfig, resources: Vec<String>) -> Result<Self> {
        Self::with_session(config, Session::new(), resources)
    }

    /// State around an already established session.
    pub fn with_session(
        config: AuthConfig,
        session: Session,
        resources: Vec<String>,
    ) -> Result<Self> {
        config.validate()?;
        if let AuthConfig::Hnap(hnap) = &config {
            if hnap.data_actions.is_empty() && resources.is_empty() {
                return Err(AppError::config(
                    "HNAP target has no data actions to request",
                ));
            }
        }
        Ok(Self {
            strategy: strategy_for_config(&config),
            config,
            session,
            resources,
        })
    }

    /// State from a finished discovery, keeping its live session.
    pub fn from_discovery(discovery: Discovery) -> Result<Self> {
        Self::with_session(discovery.config, discovery.session, discovery.data_paths)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    async fn login(&mut self, client: &DeviceClient, credentials: Option<&Credentials>) -> Result<()> {
        let outcome = self
            .strategy
            .login(client, &mut self.session, credentials, &self.config)
            .await?;
        if let Some(algorithm) = outcome.negotiated {
            if self.config.record_negotiated_algorithm(algorithm) {
                log::info!("Recorded negotiated HNAP algorithm {} for {}", algorithm, client.base());
            }
        }
        outcome.into_result()
    }

    /// One fetch. Expired-looking bodies become `SessionExpired`, other
    /// error statuses a protocol error.
    async fn fetch(&mut self, client: &DeviceClient) -> Result<Vec<RawBody>> {
        let bodies = self
            .strategy
            .fetch(client, &mut self.session, &self.config, &self.resources)
            .await?;
        if bodies
            .iter()
            .any(|raw| self.strategy.is_expired(raw, &self.config))
        {
            return Err(AppError::SessionExpired);
        }
        if let Some(raw) = bodies.iter().find(|raw| raw.status >= 400) {
            return Err(AppError::protocol(format!(
                "{} returned HTTP {}",
                raw.resource, raw.status
            )));
        }
        Ok(bodies)
    }
}

/// Poll outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub polls: u64,
    pub successes: u64,
    pub failures: u64,
    pub relogins: u64,
    pub circuit_rejections: u64,
}

/// Poll-time coordinator for one target.
#[derive(Debug)]
pub struct Orchestrator {
    client: DeviceClient,
    state: TargetState,
    breaker: CircuitBreaker,
    stats: PollStats,
}

impl Orchestrator {
    pub fn new(
        client: DeviceClient,
        config: AuthConfig,
        resources: Vec<String>,
        circuit: &CircuitConfig,
    ) -> Result<Self> {
        Ok(Self {
            client,
            state: TargetState::new(config, resources)?,
            breaker: CircuitBreaker::with_config(CircuitBreakerConfig::from(circuit)),
            stats: PollStats::default(),
        })
    }

    /// Start polling with the session discovery already established.
    pub fn from_discovery(
        client: DeviceClient,
        discovery: Discovery,
        circuit: &CircuitConfig,
    ) -> Result<Self> {
        Ok(Self {
            client,
            state: TargetState::from_discovery(discovery)?,
            breaker: CircuitBreaker::with_config(CircuitBreakerConfig::from(circuit)),
            stats: PollStats::default(),
        })
    }

    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    pub fn config(&self) -> &AuthConfig {
        self.state.config()
    }

    pub fn state(&self) -> &TargetState {
        &self.state
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// New config with a fresh session. The old session is dropped in the
    /// same step; an invalid config leaves the current state untouched.
    pub fn reconfigure(&mut self, config: AuthConfig) -> Result<()> {
        let state = TargetState::new(config, self.state.resources.clone())?;
        log::info!(
            "Reconfigured {}: {}",
            self.client.base(),
            state.strategy.describe(&state.config)
        );
        self.state = state;
        Ok(())
    }

    /// Swap in a whole new state, e.g. from a re-run of discovery.
    pub fn replace_state(&mut self, state: TargetState) {
        self.state = state;
    }

    /// One poll cycle.
    pub async fn poll(&mut self, credentials: Option<&Credentials>) -> Result<PollData> {
        self.stats.polls += 1;
        if let Err(error) = self.breaker.validate() {
            self.stats.circuit_rejections += 1;
            return Err(error);
        }

        let result = self.cycle(credentials).await;
        match &result {
            Ok(data) => {
                self.stats.successes += 1;
                self.breaker.record_success();
                log::debug!(
                    "Polled {} resources from {}",
                    data.bodies.len(),
                    self.client.base()
                );
            }
            Err(error) => {
                self.stats.failures += 1;
                self.breaker.record_failure(error);
                log::warn!("Poll of {} failed: {}", self.client.base(), error);
            }
        }
        result
    }

    /// Poll, then hand the bodies to the extractors. Returns the updated
    /// extractor selection for the caller to persist.
    pub async fn poll_records(
        &mut self,
        credentials: Option<&Credentials>,
        extractors: &ExtractorSet,
        selection: &ExtractorSelection,
    ) -> Result<(PollData, Records, ExtractorSelection)> {
        let data = self.poll(credentials).await?;
        let (records, selection) = extractors.run(&data, selection)?;
        Ok((data, records, selection))
    }

    async fn cycle(&mut self, credentials: Option<&Credentials>) -> Result<PollData> {
        self.client.ensure_active()?;
        let state = &mut self.state;

        if !state.strategy.session_still_valid(&state.session) {
            state.login(&self.client, credentials).await?;
        }

        match state.fetch(&self.client).await {
            Ok(bodies) => return Ok(PollData::new(bodies)),
            Err(AppError::SessionExpired) => {}
            Err(error) => return Err(error),
        }

        log::info!("Session for {} expired, logging in again", self.client.base());
        self.stats.relogins += 1;
        state.session.reset();
        state.login(&self.client, credentials).await?;

        match state.fetch(&self.client).await {
            Ok(bodies) => Ok(PollData::new(bodies)),
            Err(AppError::SessionExpired) => {
                log::warn!(
                    "Session for {} expired again right after re-login",
                    self.client.base()
                );
                Err(AppError::auth(AuthFailureKind::SessionRejected))
            }
            Err(error) => Err(error),
        }
    }
}
