use async_trait::async_trait;
use once_cell::sync::Lazy;
use url::Url;

use super::task_api::TaskApiClient;
use super::{CaptchaConfig, CaptchaProvider, CaptchaResult, CaptchaTask};
use crate::core::LookupContext;

static CAPSOLVER_API: Lazy<Url> =
    Lazy::new(|| Url::parse("https://api.capsolver.com/").expect("invalid capsolver url"));

const TURNSTILE_TASK: &str = "AntiTurnstileTaskProxyLess";

/// Adapter for the CapSolver service.
#[derive(Debug, Clone)]
pub struct CapSolverProvider {
    client: TaskApiClient,
}

impl CapSolverProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(api_key, CaptchaConfig::default())
    }

    pub fn with_config(api_key: impl Into<String>, config: CaptchaConfig) -> Self {
        Self::with_base_url(api_key, config, CAPSOLVER_API.clone())
    }

    /// Point the provider at a different API host (staging, test servers).
    pub fn with_base_url(api_key: impl Into<String>, config: CaptchaConfig, base_url: Url) -> Self {
        Self {
            client: TaskApiClient::new("capsolver", base_url, api_key.into(), config),
        }
    }

    pub fn base_url(&self) -> &Url {
        self.client.base_url()
    }

    pub fn config(&self) -> &CaptchaConfig {
        self.client.config()
    }
}

#[async_trait]
impl CaptchaProvider for CapSolverProvider {
    fn name(&self) -> &'static str {
        "capsolver"
    }

    async fn solve(&self, ctx: &LookupContext, task: &CaptchaTask) -> CaptchaResult {
        self.client.solve(ctx, TURNSTILE_TASK, task).await
    }
}
