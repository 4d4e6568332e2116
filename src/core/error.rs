//! Code-level failures returned by jurisdiction adapters.
//!
//! Expected conditions ("not supported", "not configured") are never errors;
//! adapters encode those as a `LicenseResult` with `found == false` and an
//! explanatory `error` string.

use thiserror::Error;

use super::context::Interrupted;
use crate::external_deps::captcha::CaptchaError;
use crate::session::SessionError;

pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{state}: session error: {source}")]
    Session {
        state: String,
        #[source]
        source: SessionError,
    },
    #[error("{state}: {step} failed: {source}")]
    Transport {
        state: String,
        step: &'static str,
        #[source]
        source: SessionError,
    },
    #[error("{state}: HTTP {status} on {step}: {excerpt}")]
    Status {
        state: String,
        step: &'static str,
        status: u16,
        excerpt: String,
    },
    #[error("{state}: captcha solve failed: {source}")]
    Challenge {
        state: String,
        #[source]
        source: CaptchaError,
    },
    #[error("{state}: parse failed: {reason}")]
    Parse { state: String, reason: String },
    #[error("{state}: API error: {message}")]
    Api { state: String, message: String },
    #[error("{state}: {source}")]
    Interrupted {
        state: String,
        #[source]
        source: Interrupted,
    },
}

impl LookupError {
    pub fn state(&self) -> &str {
        match self {
            Self::Session { state, .. }
            | Self::Transport { state, .. }
            | Self::Status { state, .. }
            | Self::Challenge { state, .. }
            | Self::Parse { state, .. }
            | Self::Api { state, .. }
            | Self::Interrupted { state, .. } => state,
        }
    }

    pub(crate) fn transport(state: &str, step: &'static str, source: SessionError) -> Self {
        Self::Transport {
            state: state.to_string(),
            step,
            source,
        }
    }

    pub(crate) fn interrupted(state: &str, source: Interrupted) -> Self {
        Self::Interrupted {
            state: state.to_string(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
            || matches!(
                self,
                Self::Challenge {
                    source: CaptchaError::Interrupted(_),
                    ..
                }
            )
    }
}

/// Keep error bodies short enough for log lines.
pub(crate) fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
