//! High-level entry point wiring configuration, sessions, the solver
//! gateway, the registry and the NPN search together.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use crate::config::{ConfigError, VerifierConfig};
use crate::core::{LicenseResult, LookupContext, LookupError};
use crate::events::{
    EventDispatcher, LookupFailedEvent, LookupFinishedEvent, LookupKind, LookupStartedEvent,
    VerificationEvent,
};
use crate::matching::{MatchSelector, SelectError};
use crate::scrapers::Registry;
use crate::scrapers::registry::normalize_code;
use crate::search::{MultiJurisdictionSearch, SearchError};
use crate::session::{BrowserSessionFactory, SessionError, SessionFactory, chrome_desktop_profile};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("'{0}' is not a 2-letter state code")]
    InvalidState(String),
    /// The lookup itself failed; the caller should offer the manual URL.
    #[error("{state} lookup temporarily unavailable: {source}")]
    Unavailable {
        state: String,
        manual_lookup_url: String,
        #[source]
        source: LookupError,
    },
    #[error("{reason}")]
    NotVerified {
        #[source]
        reason: SelectError,
        manual_lookup_url: String,
    },
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl VerifyError {
    /// Manual verification link, when the failure came from one jurisdiction.
    pub fn manual_lookup_url(&self) -> Option<&str> {
        match self {
            Self::Unavailable {
                manual_lookup_url, ..
            }
            | Self::NotVerified {
                manual_lookup_url, ..
            } if !manual_lookup_url.is_empty() => Some(manual_lookup_url.as_str()),
            _ => None,
        }
    }
}

pub struct LicenseVerifier {
    config: VerifierConfig,
    registry: Arc<Registry>,
    search: MultiJurisdictionSearch,
    events: EventDispatcher,
}

impl LicenseVerifier {
    /// Verifier talking to the real sites through browser-fingerprinted
    /// sessions.
    pub fn new(config: VerifierConfig) -> Result<Self, VerifyError> {
        let sessions =
            BrowserSessionFactory::with_timeout(chrome_desktop_profile(), config.session_timeout)?;
        Ok(Self::with_sessions(config, Arc::new(sessions)))
    }

    pub fn from_env() -> Result<Self, VerifyError> {
        Self::new(VerifierConfig::from_env()?)
    }

    pub fn with_sessions(config: VerifierConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        let registry = Arc::new(Registry::with_endpoints(
            sessions,
            config.solver(),
            config.endpoints.clone(),
        ));
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: VerifierConfig, registry: Arc<Registry>) -> Self {
        let events = EventDispatcher::with_logging();
        let search = MultiJurisdictionSearch::new(registry.clone(), config.search.clone())
            .with_events(events.clone());
        Self {
            config,
            registry,
            search,
            events,
        }
    }

    /// Replace the event handlers used by the verifier and its search.
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.search = self.search.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Look the person up in `state` and return the best active record.
    pub async fn verify(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
        state: &str,
    ) -> Result<LicenseResult, VerifyError> {
        let code = validate_state(state)?;
        let results = self
            .lookup(ctx, &code, Query::Name { first_name, last_name })
            .await?;

        MatchSelector::new(first_name, last_name, &code)
            .select_best(&results)
            .cloned()
            .map_err(|reason| VerifyError::NotVerified {
                reason,
                manual_lookup_url: self.manual_lookup_url(&code),
            })
    }

    /// Raw records `state` holds for `npn`, including not-found placeholders.
    pub async fn lookup_npn(
        &self,
        ctx: &LookupContext,
        npn: &str,
        state: &str,
    ) -> Result<Vec<LicenseResult>, VerifyError> {
        let code = validate_state(state)?;
        self.lookup(ctx, &code, Query::Npn(npn)).await
    }

    /// Raw records `state` holds for its own license number.
    pub async fn lookup_license_number(
        &self,
        ctx: &LookupContext,
        license_number: &str,
        state: &str,
    ) -> Result<Vec<LicenseResult>, VerifyError> {
        let code = validate_state(state)?;
        self.lookup(ctx, &code, Query::LicenseNumber(license_number)).await
    }

    /// Find the person's NPN in `state`, or across every NPN-reporting
    /// jurisdiction when no state is given.
    pub async fn find_npn(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
        state: Option<&str>,
    ) -> Result<Vec<LicenseResult>, VerifyError> {
        let Some(state) = state else {
            return Ok(self.search.find_by_name(ctx, first_name, last_name).await?);
        };

        let code = validate_state(state)?;
        let results = self
            .lookup(ctx, &code, Query::Name { first_name, last_name })
            .await?;

        let with_npn: Vec<LicenseResult> = results
            .into_iter()
            .filter(|result| result.found && !result.npn.is_empty())
            .collect();
        if with_npn.is_empty() {
            return Err(SearchError::NoNpnFound {
                name: format!("{} {}", first_name.trim(), last_name.trim()),
                jurisdictions: 1,
            }
            .into());
        }
        Ok(with_npn)
    }

    fn manual_lookup_url(&self, code: &str) -> String {
        self.registry.get_adapter(code).manual_lookup_url().to_string()
    }

    /// One adapter call under the lookup timeout, reported as events.
    async fn lookup(
        &self,
        ctx: &LookupContext,
        code: &str,
        query: Query<'_>,
    ) -> Result<Vec<LicenseResult>, VerifyError> {
        let adapter = self.registry.get_adapter(code);
        let lookup_ctx = ctx.child_with_timeout(self.config.lookup_timeout);
        let kind = query.kind();

        self.events
            .dispatch(VerificationEvent::LookupStarted(LookupStartedEvent {
                state: code.to_string(),
                kind,
                timestamp: Utc::now(),
            }));
        let started = Instant::now();

        let pending = async {
            match query {
                Query::Name {
                    first_name,
                    last_name,
                } => adapter.lookup_by_name(&lookup_ctx, first_name, last_name).await,
                Query::Npn(npn) => adapter.lookup_by_npn(&lookup_ctx, npn).await,
                Query::LicenseNumber(number) => {
                    adapter.lookup_by_license_number(&lookup_ctx, number).await
                }
            }
        };
        // Adapters that ignore the context still stop at the timeout.
        let outcome = match lookup_ctx.run(pending).await {
            Ok(outcome) => outcome,
            Err(reason) => Err(LookupError::interrupted(code, reason)),
        };

        match outcome {
            Ok(results) => {
                self.events
                    .dispatch(VerificationEvent::LookupFinished(LookupFinishedEvent {
                        state: code.to_string(),
                        kind,
                        records: results.len(),
                        found: results.iter().any(|result| result.found),
                        latency: started.elapsed(),
                        timestamp: Utc::now(),
                    }));
                Ok(results)
            }
            Err(err) => {
                self.events
                    .dispatch(VerificationEvent::LookupFailed(LookupFailedEvent {
                        state: code.to_string(),
                        kind,
                        error: err.to_string(),
                        interrupted: err.is_interrupted(),
                        timestamp: Utc::now(),
                    }));
                Err(VerifyError::Unavailable {
                    state: code.to_string(),
                    manual_lookup_url: adapter.manual_lookup_url().to_string(),
                    source: err,
                })
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Query<'a> {
    Name {
        first_name: &'a str,
        last_name: &'a str,
    },
    Npn(&'a str),
    LicenseNumber(&'a str),
}

impl Query<'_> {
    fn kind(&self) -> LookupKind {
        match self {
            Self::Name { .. } => LookupKind::Name,
            Self::Npn(_) => LookupKind::Npn,
            Self::LicenseNumber(_) => LookupKind::LicenseNumber,
        }
    }
}

fn validate_state(state: &str) -> Result<String, VerifyError> {
    let code = normalize_code(state);
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(VerifyError::InvalidState(state.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{HttpSession, SessionResult};

    fn verifier() -> LicenseVerifier {
        let sessions: Arc<dyn SessionFactory> =
            Arc::new(|| -> SessionResult<Box<dyn HttpSession>> { panic!("no network expected") });
        LicenseVerifier::with_sessions(VerifierConfig::default(), sessions)
    }

    #[test]
    fn validates_state_codes() {
        assert_eq!(validate_state(" tx ").unwrap(), "TX");
        assert!(matches!(validate_state("Texas"), Err(VerifyError::InvalidState(_))));
        assert!(matches!(validate_state("1A"), Err(VerifyError::InvalidState(_))));
    }

    #[tokio::test]
    async fn gated_state_without_solver_is_not_verified() {
        let err = verifier()
            .verify(&LookupContext::background(), "Jane", "Doe", "ca")
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotVerified { reason: SelectError::Lookup(_), .. }));
        assert!(err.to_string().contains("not configured"));
        assert_eq!(err.manual_lookup_url(), Some("https://cdicloud.insurance.ca.gov/cal/"));
    }

    #[tokio::test]
    async fn manual_state_points_to_lookup_page() {
        let err = verifier()
            .verify(&LookupContext::background(), "Jane", "Doe", "KY")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("no automated lookup for KY"));
        assert_eq!(
            err.manual_lookup_url(),
            Some("https://insurance.ky.gov/ppc/agentlookup.aspx")
        );
    }
}
