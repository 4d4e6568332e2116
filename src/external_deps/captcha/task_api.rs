//! Client for the createTask / getTaskResult protocol spoken by CapSolver and
//! the 2Captcha v2 API.
//!
//! Flow:
//! 1. POST `createTask` with the client key and a task description.
//! 2. Wait the poll interval, then POST `getTaskResult` until the task is
//!    `ready` or the provider timeout elapses.
//!
//! Poll-time transport and decode failures are retried; vendor-reported
//! errors are not.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;
use url::Url;

use super::{CaptchaConfig, CaptchaError, CaptchaResult, CaptchaSolution, CaptchaTask};
use crate::core::LookupContext;

const POLL_JITTER_MILLIS: u64 = 250;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultRequest<'a> {
    client_key: &'a str,
    task_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    #[serde(default)]
    error_id: i64,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default, deserialize_with = "task_id_string")]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    #[serde(default)]
    error_id: i64,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    solution: Option<TaskSolution>,
}

#[derive(Debug, Deserialize)]
struct TaskSolution {
    #[serde(default)]
    token: String,
    #[serde(default, rename = "userAgent")]
    user_agent: Option<String>,
}

/// 2Captcha returns numeric task ids, CapSolver returns strings.
fn task_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone)]
pub(super) struct TaskApiClient {
    vendor: &'static str,
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    config: CaptchaConfig,
}

impl TaskApiClient {
    pub(super) fn new(
        vendor: &'static str,
        base_url: Url,
        api_key: String,
        config: CaptchaConfig,
    ) -> Self {
        Self {
            vendor,
            http: reqwest::Client::new(),
            base_url,
            api_key,
            config,
        }
    }

    pub(super) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(super) fn config(&self) -> &CaptchaConfig {
        &self.config
    }

    pub(super) async fn solve(
        &self,
        ctx: &LookupContext,
        task_type: &str,
        task: &CaptchaTask,
    ) -> CaptchaResult {
        if self.api_key.trim().is_empty() {
            return Err(CaptchaError::Configuration(format!(
                "{} api key is empty",
                self.vendor
            )));
        }

        let task_id = self.create_task(ctx, task_type, task).await?;
        log::debug!("{} task {task_id} created for {}", self.vendor, task.page_url);

        let started = Instant::now();
        while started.elapsed() < self.config.timeout {
            ctx.sleep(self.poll_delay()).await?;

            let polled = match self.poll(ctx, &task_id).await {
                Ok(polled) => polled,
                Err(CaptchaError::Transport(reason)) => {
                    log::debug!("{} poll retry: {reason}", self.vendor);
                    continue;
                }
                Err(err) => return Err(err),
            };

            if polled.error_id != 0 {
                return Err(CaptchaError::Provider(describe(
                    polled.error_code,
                    polled.error_description,
                )));
            }

            if polled.status == "ready" {
                let solution = polled.solution.ok_or_else(|| {
                    CaptchaError::Provider("ready response without solution".into())
                })?;
                if solution.token.is_empty() {
                    return Err(CaptchaError::Provider("empty token in ready response".into()));
                }
                log::info!(
                    "{} solved task {task_id} in {:.1}s",
                    self.vendor,
                    started.elapsed().as_secs_f64()
                );
                let mut result = CaptchaSolution::new(solution.token)
                    .insert_metadata("task_id", task_id.clone())
                    .insert_metadata("vendor", self.vendor);
                if let Some(user_agent) = solution.user_agent {
                    result = result.insert_metadata("user_agent", user_agent);
                }
                return Ok(result);
            }
        }

        Err(CaptchaError::Timeout(self.config.timeout))
    }

    async fn create_task(
        &self,
        ctx: &LookupContext,
        task_type: &str,
        task: &CaptchaTask,
    ) -> Result<String, CaptchaError> {
        let mut task_body = json!({
            "type": task_type,
            "websiteURL": task.page_url.as_str(),
            "websiteKey": task.site_key,
        });
        if let Some(action) = &task.action
            && let Some(map) = task_body.as_object_mut()
        {
            map.insert("metadata".into(), json!({ "action": action }));
        }

        let payload = json!({
            "clientKey": self.api_key,
            "task": task_body,
        });

        let url = self.endpoint("createTask")?;
        let response = ctx
            .run(self.http.post(url).json(&payload).send())
            .await?
            .map_err(|err| CaptchaError::Provider(format!("create task failed: {err}")))?;
        let created: CreateTaskResponse = ctx
            .run(response.json())
            .await?
            .map_err(|err| CaptchaError::Provider(format!("parse create response: {err}")))?;

        if created.error_id != 0 {
            return Err(CaptchaError::Provider(format!(
                "create task error: {}",
                describe(created.error_code, created.error_description)
            )));
        }

        created
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CaptchaError::Provider("create task returned no task id".into()))
    }

    async fn poll(
        &self,
        ctx: &LookupContext,
        task_id: &str,
    ) -> Result<TaskResultResponse, CaptchaError> {
        let url = self.endpoint("getTaskResult")?;
        let request = TaskResultRequest {
            client_key: &self.api_key,
            task_id,
        };

        let response = ctx
            .run(self.http.post(url).json(&request).send())
            .await?
            .map_err(|err| CaptchaError::Transport(err.to_string()))?;

        ctx.run(response.json::<TaskResultResponse>())
            .await?
            .map_err(|err| CaptchaError::Transport(err.to_string()))
    }

    fn endpoint(&self, method: &str) -> Result<Url, CaptchaError> {
        self.base_url
            .join(method)
            .map_err(|err| CaptchaError::Configuration(format!("invalid base url: {err}")))
    }

    fn poll_delay(&self) -> Duration {
        let jitter = if self.config.poll_interval >= Duration::from_secs(1) {
            rand::thread_rng().gen_range(0..=POLL_JITTER_MILLIS)
        } else {
            0
        };
        self.config.poll_interval + Duration::from_millis(jitter)
    }
}

fn describe(code: Option<String>, description: Option<String>) -> String {
    match (code, description) {
        (Some(code), Some(description)) => format!("{code} - {description}"),
        (Some(code), None) => code,
        (None, Some(description)) => description,
        (None, None) => "unknown error".into(),
    }
}
