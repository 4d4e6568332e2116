//! Browser-fingerprinted HTTP sessions.
//!
//! Several DOI sites reject clients whose TLS handshake does not look like a
//! mainstream browser. Adapters never build HTTP clients themselves; they ask a
//! [`SessionFactory`] for a fresh [`HttpSession`] per multi-request sequence so
//! cookies and anti-CSRF tokens captured by one step are honoured by the next,
//! without leaking into other sequences.

pub mod profile;
pub mod reqwest_session;
pub mod tls;

pub use profile::{BrowserProfile, Ja3, chrome_desktop_profile};
pub use reqwest_session::{BrowserSessionFactory, ReqwestSession};

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use thiserror::Error;
use url::Url;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session build failed: {0}")]
    Build(String),
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("unusable TLS fingerprint: {0}")]
    Fingerprint(String),
}

/// Response captured by a session; the body is fully buffered.
#[derive(Debug, Clone)]
pub struct SessionResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

impl SessionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One cookie-isolated browser session.
///
/// A session must not be shared by two in-flight sequences.
#[async_trait]
pub trait HttpSession: Send + Sync {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> SessionResult<SessionResponse>;

    async fn post_form(
        &self,
        url: &Url,
        headers: &HeaderMap,
        form: &[(String, String)],
    ) -> SessionResult<SessionResponse>;
}

/// Produces fresh sessions sharing one fixed browser fingerprint.
pub trait SessionFactory: Send + Sync {
    fn new_session(&self) -> SessionResult<Box<dyn HttpSession>>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> SessionResult<Box<dyn HttpSession>> + Send + Sync,
{
    fn new_session(&self) -> SessionResult<Box<dyn HttpSession>> {
        self()
    }
}
