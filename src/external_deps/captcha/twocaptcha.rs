use async_trait::async_trait;
use once_cell::sync::Lazy;
use url::Url;

use super::task_api::TaskApiClient;
use super::{CaptchaConfig, CaptchaProvider, CaptchaResult, CaptchaTask};
use crate::core::LookupContext;

static TWOCAPTCHA_API: Lazy<Url> =
    Lazy::new(|| Url::parse("https://api.2captcha.com/").expect("invalid 2captcha url"));

const TURNSTILE_TASK: &str = "TurnstileTaskProxyless";

/// Adapter for the TwoCaptcha v2 JSON API.
#[derive(Debug, Clone)]
pub struct TwoCaptchaProvider {
    client: TaskApiClient,
}

impl TwoCaptchaProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(api_key, CaptchaConfig::default())
    }

    pub fn with_config(api_key: impl Into<String>, config: CaptchaConfig) -> Self {
        Self::with_base_url(api_key, config, TWOCAPTCHA_API.clone())
    }

    pub fn with_base_url(api_key: impl Into<String>, config: CaptchaConfig, base_url: Url) -> Self {
        Self {
            client: TaskApiClient::new("twocaptcha", base_url, api_key.into(), config),
        }
    }

    pub fn base_url(&self) -> &Url {
        self.client.base_url()
    }
}

#[async_trait]
impl CaptchaProvider for TwoCaptchaProvider {
    fn name(&self) -> &'static str {
        "twocaptcha"
    }

    async fn solve(&self, ctx: &LookupContext, task: &CaptchaTask) -> CaptchaResult {
        self.client.solve(ctx, TURNSTILE_TASK, task).await
    }
}
