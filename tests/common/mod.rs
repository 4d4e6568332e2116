#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use doi_scraper_rs::{
    BrowserSessionFactory, Endpoints, HttpSession, SessionError, SessionFactory, SessionResponse,
    SessionResult, chrome_desktop_profile,
};
use http::HeaderMap;
use url::Url;
use wiremock::MockServer;

pub fn browser_sessions() -> Arc<dyn SessionFactory> {
    Arc::new(BrowserSessionFactory::new(chrome_desktop_profile()).expect("session factory"))
}

/// Every upstream, including both solver APIs, pointed at `server`.
pub fn mock_endpoints(server: &MockServer) -> Endpoints {
    let base = Url::parse(&server.uri()).expect("mock server url");
    Endpoints {
        naic_api: base.join("api/licenseLookup/search").expect("naic url"),
        florida: base.clone(),
        california: base.join("cal/").expect("ca url"),
        texas: base.join("NASApp/tdi/TdiARManager").expect("tx url"),
        capsolver_api: Some(base.clone()),
        twocaptcha_api: Some(base),
    }
}

/// Session factory that records activity and never touches the network.
#[derive(Default)]
pub struct CountingSessions {
    pub sessions: AtomicUsize,
    pub requests: Arc<AtomicUsize>,
}

impl CountingSessions {
    pub fn sessions_created(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn requests_sent(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl SessionFactory for CountingSessions {
    fn new_session(&self) -> SessionResult<Box<dyn HttpSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            requests: self.requests.clone(),
        }))
    }
}

struct CountingSession {
    requests: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpSession for CountingSession {
    async fn get(&self, _url: &Url, _headers: &HeaderMap) -> SessionResult<SessionResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Err(SessionError::Transport("counting session is offline".into()))
    }

    async fn post_form(
        &self,
        _url: &Url,
        _headers: &HeaderMap,
        _form: &[(String, String)],
    ) -> SessionResult<SessionResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Err(SessionError::Transport("counting session is offline".into()))
    }
}
