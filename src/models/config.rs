//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{AuthConfig, Credentials, DeviceProfile};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Poll failure circuit breaker
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Discovery probing and known device profiles
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Devices to discover and poll
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.circuit.failure_threshold == 0 {
            return Err(AppError::validation(
                "circuit.failure_threshold must be > 0",
            ));
        }
        if self.discovery.probe_paths.is_empty() {
            return Err(AppError::validation("discovery.probe_paths is empty"));
        }
        for profile in &self.discovery.profiles {
            profile.auth.validate().map_err(|e| {
                AppError::validation(format!("profile '{}': {e}", profile.name))
            })?;
        }
        let mut seen = std::collections::HashSet::new();
        for target in &self.targets {
            if target.id.trim().is_empty() {
                return Err(AppError::validation("target id is empty"));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate target id '{}'",
                    target.id
                )));
            }
            if target.address.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "target '{}' has no address",
                    target.id
                )));
            }
            if let Some(auth) = &target.hints.auth {
                auth.validate()?;
            }
        }
        Ok(())
    }

    pub fn target(&self, id: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.id == id)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-call timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Redirect hops followed per request
    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: usize,

    /// Devices ship self-signed certificates
    #[serde(default = "defaults::accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_redirects: defaults::max_redirects(),
            accept_invalid_certs: defaults::accept_invalid_certs(),
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failed polls before polling pauses
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,

    /// Pause length once tripped, in seconds
    #[serde(default = "defaults::cooldown")]
    pub cooldown_secs: u64,

    /// Trip immediately when a device reports a login lockout
    #[serde(default)]
    pub trip_on_lockout: bool,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::failure_threshold(),
            cooldown_secs: defaults::cooldown(),
            trip_on_lockout: false,
        }
    }
}

/// Discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Paths probed anonymously when no hint names one
    #[serde(default = "defaults::probe_paths")]
    pub probe_paths: Vec<String>,

    /// Known device profiles used to score candidates
    #[serde(default = "defaults::profiles")]
    pub profiles: Vec<DeviceProfile>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_paths: defaults::probe_paths(),
            profiles: defaults::profiles(),
        }
    }
}

/// Best-effort defaults a caller can pass into discovery. Live markup
/// always overrides them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DiscoveryHints {
    /// Path to probe instead of the configured probe paths
    #[serde(default)]
    pub probe_path: Option<String>,

    /// Expected model name, matched against known profiles
    #[serde(default)]
    pub model: Option<String>,

    /// Expected authentication parameters
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Resources to poll
    #[serde(default)]
    pub data_paths: Vec<String>,
}

/// One device to manage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Stable identifier, used as the storage key
    pub id: String,

    /// Address or base URL of the device
    pub address: String,

    /// Environment variable holding the username
    #[serde(default)]
    pub username_env: Option<String>,

    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default)]
    pub hints: DiscoveryHints,
}

impl TargetConfig {
    /// Credentials from the configured environment variables, if set.
    pub fn credentials(&self) -> Option<Credentials> {
        let user_var = self.username_env.as_deref()?;
        let pass_var = self.password_env.as_deref().unwrap_or("MODEM_PASSWORD");
        Credentials::from_env(user_var, pass_var)
    }
}

mod defaults {
    use crate::models::{
        AuthConfig, BasicHeaderConfig, DeviceProfile, FormConfig, HnapConfig, PasswordEncoding,
        SuccessCheck, UrlTokenConfig,
    };

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; modem-auth/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_redirects() -> usize {
        5
    }
    pub fn accept_invalid_certs() -> bool {
        true
    }

    // Circuit defaults
    pub fn failure_threshold() -> u32 {
        5
    }
    pub fn cooldown() -> u64 {
        300
    }

    // Discovery defaults
    pub fn probe_paths() -> Vec<String> {
        vec!["/".into()]
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Known device profiles
    pub fn profiles() -> Vec<DeviceProfile> {
        vec![
            DeviceProfile {
                name: "Arris S33".into(),
                manufacturer: "Arris".into(),
                detect_body_contains: strings(&["S33"]),
                detect_url_contains: vec![],
                auth: AuthConfig::Hnap(HnapConfig {
                    data_actions: strings(&[
                        "GetCustomerStatusStartupSequence",
                        "GetCustomerStatusConnectionInfo",
                        "GetCustomerStatusDownstreamChannelInfo",
                        "GetCustomerStatusUpstreamChannelInfo",
                    ]),
                    ..HnapConfig::default()
                }),
                data_paths: vec![],
            },
            DeviceProfile {
                name: "Motorola MB8611".into(),
                manufacturer: "Motorola".into(),
                detect_body_contains: strings(&["MB8611"]),
                detect_url_contains: vec![],
                auth: AuthConfig::Hnap(HnapConfig {
                    data_actions: strings(&[
                        "GetMotoStatusStartupSequence",
                        "GetMotoStatusConnectionInfo",
                        "GetMotoStatusDownstreamChannelInfo",
                        "GetMotoStatusUpstreamChannelInfo",
                    ]),
                    ..HnapConfig::default()
                }),
                data_paths: vec![],
            },
            DeviceProfile {
                name: "Arris SB8200".into(),
                manufacturer: "Arris".into(),
                detect_body_contains: strings(&["SB8200"]),
                detect_url_contains: strings(&["cmconnectionstatus"]),
                auth: AuthConfig::UrlToken(UrlTokenConfig::default()),
                data_paths: strings(&["/cmconnectionstatus.html"]),
            },
            DeviceProfile {
                name: "Motorola MB7621".into(),
                manufacturer: "Motorola".into(),
                detect_body_contains: strings(&["MB7621"]),
                detect_url_contains: vec![],
                auth: AuthConfig::Form(FormConfig {
                    login_page: "/".into(),
                    username_field: "loginUsername".into(),
                    password_field: "loginPassword".into(),
                    encoding: PasswordEncoding::Base64,
                    success: SuccessCheck::RedirectContains("MotoHome".into()),
                    ..FormConfig::new("/goform/login")
                }),
                data_paths: strings(&["/MotoConnection.asp"]),
            },
            DeviceProfile {
                name: "Arris SB6190".into(),
                manufacturer: "Arris".into(),
                detect_body_contains: strings(&["SB6190"]),
                detect_url_contains: vec![],
                auth: AuthConfig::Form(FormConfig {
                    login_page: "/cgi-bin/adv_pwd_cgi".into(),
                    username_field: "username".into(),
                    password_field: "password".into(),
                    encoding: PasswordEncoding::Nonce,
                    success: SuccessCheck::BodyContains("Url:".into()),
                    ..FormConfig::new("/cgi-bin/adv_pwd_cgi")
                }),
                data_paths: strings(&["/cgi-bin/status"]),
            },
            DeviceProfile {
                name: "Netgear CM600".into(),
                manufacturer: "Netgear".into(),
                detect_body_contains: strings(&["CM600"]),
                detect_url_contains: vec![],
                auth: AuthConfig::BasicHeader(BasicHeaderConfig::default()),
                data_paths: strings(&["/DocsisStatus.asp"]),
            },
            DeviceProfile {
                name: "Technicolor TC4400".into(),
                manufacturer: "Technicolor".into(),
                detect_body_contains: strings(&["TC4400"]),
                detect_url_contains: vec![],
                auth: AuthConfig::BasicHeader(BasicHeaderConfig::default()),
                data_paths: strings(&["/cmconnectionstatus.html"]),
            },
            DeviceProfile {
                name: "Arris SB6141".into(),
                manufacturer: "Arris".into(),
                detect_body_contains: strings(&["SB6141"]),
                detect_url_contains: vec![],
                auth: AuthConfig::None,
                data_paths: strings(&["/cmSignalData.htm"]),
            },
        ]
    }
}
