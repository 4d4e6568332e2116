//! Captcha provider integrations.
//!
//! These adapters provide a unified interface for third-party captcha
//! solvers such as CapSolver and TwoCaptcha. Jurisdiction adapters stay
//! agnostic of vendor-specific details while still retrieving challenge
//! tokens when a DOI site gates its search form.

mod capsolver;
mod task_api;
mod twocaptcha;

pub use capsolver::CapSolverProvider;
pub use twocaptcha::TwoCaptchaProvider;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::core::{Interrupted, LookupContext};

/// High-level configuration that controls captcha solving behaviour.
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Details describing the challenge a page presented.
#[derive(Debug, Clone)]
pub struct CaptchaTask {
    pub site_key: String,
    pub page_url: Url,
    pub action: Option<String>,
}

impl CaptchaTask {
    pub fn new(site_key: impl Into<String>, page_url: Url) -> Self {
        Self {
            site_key: site_key.into(),
            page_url,
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Resolved captcha token and vendor metadata (task id, vendor, user agent).
#[derive(Debug, Clone)]
pub struct CaptchaSolution {
    pub token: String,
    pub metadata: HashMap<String, String>,
}

impl CaptchaSolution {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn insert_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Common result type returned by captcha providers.
pub type CaptchaResult = Result<CaptchaSolution, CaptchaError>;

/// Shared interface implemented by captcha vendors.
///
/// `solve` blocks (asynchronously) until the vendor returns a token, the
/// provider's own timeout elapses, or `ctx` is interrupted.
#[async_trait]
pub trait CaptchaProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn solve(&self, ctx: &LookupContext, task: &CaptchaTask) -> CaptchaResult;

    /// Solve the challenge identified by `site_key` on `page_url` and return
    /// only the token.
    async fn solve_challenge(
        &self,
        ctx: &LookupContext,
        page_url: &Url,
        site_key: &str,
    ) -> Result<String, CaptchaError> {
        let task = CaptchaTask::new(site_key, page_url.clone()).with_action("turnstile");
        self.solve(ctx, &task).await.map(|solution| solution.token)
    }
}

/// Errors surfaced by captcha providers.
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("captcha provider misconfigured: {0}")]
    Configuration(String),
    #[error("captcha provider request failed: {0}")]
    Provider(String),
    #[error("captcha provider transport error: {0}")]
    Transport(String),
    #[error("captcha solving timed out after {0:?}")]
    Timeout(Duration),
    #[error("captcha solving interrupted: {0}")]
    Interrupted(#[from] Interrupted),
}
