//! Reqwest-backed sessions pinned to one browser profile.
//!
//! The factory builds one rustls configuration from the profile's handshake
//! and hands a copy to every client it creates. Each client gets its own
//! cookie store, so sessions never see each other's cookies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use reqwest::Client;
use rustls::ClientConfig;
use url::Url;

use super::{
    BrowserProfile, HttpSession, SessionError, SessionFactory, SessionResponse, SessionResult,
    tls,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Session factory presenting the configured browser fingerprint.
#[derive(Clone)]
pub struct BrowserSessionFactory {
    profile: Arc<BrowserProfile>,
    tls: Arc<ClientConfig>,
    timeout: Duration,
}

impl BrowserSessionFactory {
    pub fn new(profile: BrowserProfile) -> SessionResult<Self> {
        Self::with_timeout(profile, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(profile: BrowserProfile, timeout: Duration) -> SessionResult<Self> {
        let tls = tls::client_config(&profile)?;
        log::debug!("{} handshake ready: {}", profile.name, profile.ja3);

        Ok(Self {
            profile: Arc::new(profile),
            tls: Arc::new(tls),
            timeout,
        })
    }

    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    fn build_client(&self) -> SessionResult<Client> {
        Client::builder()
            .use_preconfigured_tls(ClientConfig::clone(&self.tls))
            .cookie_store(true)
            .default_headers(self.profile.base_headers()?)
            .timeout(self.timeout)
            .build()
            .map_err(|err| SessionError::Build(err.to_string()))
    }
}

impl SessionFactory for BrowserSessionFactory {
    fn new_session(&self) -> SessionResult<Box<dyn HttpSession>> {
        let client = self.build_client()?;
        log::debug!("new {} session", self.profile.name);
        Ok(Box::new(ReqwestSession::from_client(client)))
    }
}

/// One cookie-isolated session.
pub struct ReqwestSession {
    client: Client,
}

impl ReqwestSession {
    /// Wrap an existing client. The client should carry its own cookie store.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> SessionResult<SessionResponse> {
        let response = self
            .client
            .get(url.as_str())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|err| SessionError::Transport(err.to_string()))?;

        to_session_response(response).await
    }

    async fn post_form(
        &self,
        url: &Url,
        headers: &HeaderMap,
        form: &[(String, String)],
    ) -> SessionResult<SessionResponse> {
        let response = self
            .client
            .post(url.as_str())
            .headers(headers.clone())
            .form(form)
            .send()
            .await
            .map_err(|err| SessionError::Transport(err.to_string()))?;

        to_session_response(response).await
    }
}

async fn to_session_response(response: reqwest::Response) -> SessionResult<SessionResponse> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let url = response.url().clone();
    let body = response
        .bytes()
        .await
        .map_err(|err| SessionError::Transport(err.to_string()))?;

    Ok(SessionResponse {
        status,
        headers,
        body,
        url,
    })
}
