//! Verifier configuration
//!
//! Provides unified configuration with:
//! - Builder pattern
//! - Environment loading
//! - Injectable upstream endpoints for tests and staging hosts

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use thiserror::Error;
use url::Url;

use crate::external_deps::captcha::{
    CapSolverProvider, CaptchaConfig, CaptchaProvider, TwoCaptchaProvider,
};
use crate::scrapers::{CALIFORNIA_URL, FLORIDA_URL, NAIC_API_URL, TEXAS_URL};
use crate::search::SearchConfig;

pub const CAPSOLVER_API_KEY: &str = "CAPSOLVER_API_KEY";
pub const TWOCAPTCHA_API_KEY: &str = "TWOCAPTCHA_API_KEY";
pub const SEARCH_CONCURRENCY: &str = "LICENSE_SEARCH_CONCURRENCY";
pub const SEARCH_DEADLINE_SECS: &str = "LICENSE_SEARCH_DEADLINE_SECS";
pub const LOOKUP_TIMEOUT_SECS: &str = "LICENSE_LOOKUP_TIMEOUT_SECS";

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(90);

static DEFAULT_ENDPOINTS: Lazy<Endpoints> = Lazy::new(|| Endpoints {
    naic_api: static_url(NAIC_API_URL),
    florida: static_url(FLORIDA_URL),
    california: static_url(CALIFORNIA_URL),
    texas: static_url(TEXAS_URL),
    capsolver_api: None,
    twocaptcha_api: None,
});

fn static_url(raw: &str) -> Url {
    Url::parse(raw).expect("invalid static endpoint url")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Upstream hosts the adapters and solver talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub naic_api: Url,
    pub florida: Url,
    /// Site root; the search page is resolved relative to it.
    pub california: Url,
    pub texas: Url,
    /// Override for the CapSolver API host.
    pub capsolver_api: Option<Url>,
    /// Override for the 2Captcha API host.
    pub twocaptcha_api: Option<Url>,
}

impl Default for Endpoints {
    fn default() -> Self {
        DEFAULT_ENDPOINTS.clone()
    }
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub capsolver_api_key: Option<String>,
    pub twocaptcha_api_key: Option<String>,
    pub captcha: CaptchaConfig,
    pub search: SearchConfig,
    /// Bound on one single-state lookup issued by the verifier.
    pub lookup_timeout: Duration,
    /// Per-request timeout of every browser session.
    pub session_timeout: Duration,
    pub endpoints: Endpoints,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            capsolver_api_key: None,
            twocaptcha_api_key: None,
            captcha: CaptchaConfig::default(),
            search: SearchConfig::default(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            session_timeout: DEFAULT_LOOKUP_TIMEOUT,
            endpoints: Endpoints::default(),
        }
    }
}

impl VerifierConfig {
    pub fn builder() -> VerifierConfigBuilder {
        VerifierConfigBuilder::default()
    }

    /// Load settings from the process environment. Unset variables keep
    /// their defaults; blank API keys count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        config.capsolver_api_key = non_blank(CAPSOLVER_API_KEY).map(|key| key.trim().to_string());
        config.twocaptcha_api_key =
            non_blank(TWOCAPTCHA_API_KEY).map(|key| key.trim().to_string());

        if let Some(raw) = non_blank(SEARCH_CONCURRENCY) {
            config.search.concurrency = parse_number(SEARCH_CONCURRENCY, &raw, true)? as usize;
        }
        if let Some(raw) = non_blank(SEARCH_DEADLINE_SECS) {
            config.search.deadline =
                Duration::from_secs(parse_number(SEARCH_DEADLINE_SECS, &raw, false)?);
        }
        if let Some(raw) = non_blank(LOOKUP_TIMEOUT_SECS) {
            config.lookup_timeout =
                Duration::from_secs(parse_number(LOOKUP_TIMEOUT_SECS, &raw, false)?);
        }

        config.search.concurrency = config.search.concurrency.max(1);
        Ok(config)
    }

    /// The configured solver gateway, preferring CapSolver when both keys are
    /// present.
    pub fn solver(&self) -> Option<Arc<dyn CaptchaProvider>> {
        if let Some(key) = &self.capsolver_api_key {
            let provider = match &self.endpoints.capsolver_api {
                Some(base) => CapSolverProvider::with_base_url(key, self.captcha.clone(), base.clone()),
                None => CapSolverProvider::with_config(key, self.captcha.clone()),
            };
            return Some(Arc::new(provider));
        }
        if let Some(key) = &self.twocaptcha_api_key {
            let provider = match &self.endpoints.twocaptcha_api {
                Some(base) => {
                    TwoCaptchaProvider::with_base_url(key, self.captcha.clone(), base.clone())
                }
                None => TwoCaptchaProvider::with_config(key, self.captcha.clone()),
            };
            return Some(Arc::new(provider));
        }
        None
    }
}

/// `allow_zero` admits 0 for values that are clamped afterwards.
fn parse_number(var: &'static str, raw: &str, allow_zero: bool) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 || allow_zero => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: raw.to_string(),
        }),
    }
}

/// Builder for [`VerifierConfig`].
#[derive(Debug, Default)]
pub struct VerifierConfigBuilder {
    config: VerifierConfig,
}

impl VerifierConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capsolver_key(mut self, key: impl Into<String>) -> Self {
        self.config.capsolver_api_key = Some(key.into());
        self
    }

    pub fn with_twocaptcha_key(mut self, key: impl Into<String>) -> Self {
        self.config.twocaptcha_api_key = Some(key.into());
        self
    }

    pub fn with_captcha_config(mut self, captcha: CaptchaConfig) -> Self {
        self.config.captcha = captcha;
        self
    }

    pub fn with_search_concurrency(mut self, concurrency: usize) -> Self {
        self.config.search.concurrency = concurrency.max(1);
        self
    }

    pub fn with_search_deadline(mut self, deadline: Duration) -> Self {
        self.config.search.deadline = deadline;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.config.lookup_timeout = timeout;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn build(self) -> VerifierConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_reference_values() {
        let config = VerifierConfig::default();
        assert_eq!(config.search.concurrency, 10);
        assert_eq!(config.search.deadline, Duration::from_secs(120));
        assert_eq!(config.lookup_timeout, Duration::from_secs(90));
        assert!(config.solver().is_none());
        assert_eq!(config.endpoints.naic_api.as_str(), NAIC_API_URL);
    }

    #[test]
    fn reads_environment_values() {
        let config = VerifierConfig::from_lookup(lookup(&[
            (CAPSOLVER_API_KEY, " cap-key "),
            (SEARCH_CONCURRENCY, "0"),
            (SEARCH_DEADLINE_SECS, "30"),
        ]))
        .unwrap();
        assert_eq!(config.capsolver_api_key.as_deref(), Some("cap-key"));
        assert_eq!(config.search.concurrency, 1);
        assert_eq!(config.search.deadline, Duration::from_secs(30));
        assert_eq!(config.solver().map(|s| s.name()), Some("capsolver"));
    }

    #[test]
    fn blank_key_is_unset() {
        let config = VerifierConfig::from_lookup(lookup(&[
            (CAPSOLVER_API_KEY, "   "),
            (TWOCAPTCHA_API_KEY, "two-key"),
        ]))
        .unwrap();
        assert!(config.capsolver_api_key.is_none());
        assert_eq!(config.solver().map(|s| s.name()), Some("twocaptcha"));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = VerifierConfig::from_lookup(lookup(&[(LOOKUP_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(LOOKUP_TIMEOUT_SECS));
        assert!(VerifierConfig::from_lookup(lookup(&[(SEARCH_DEADLINE_SECS, "0")])).is_err());
    }

    #[test]
    fn builder_overrides() {
        let config = VerifierConfig::builder()
            .with_search_concurrency(0)
            .with_lookup_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.search.concurrency, 1);
        assert_eq!(config.lookup_timeout, Duration::from_secs(5));
    }
}
