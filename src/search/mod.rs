//! NPN discovery across every jurisdiction whose adapter reports NPNs.
//!
//! One lookup runs per jurisdiction, at most [`SearchConfig::concurrency`] at
//! a time, under a single overall deadline. Failing or panicking
//! jurisdictions are logged and skipped; when the deadline passes the
//! remaining lookups are aborted and whatever was collected is returned.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::core::{Interrupted, LicenseResult, LookupContext, LookupError, Scraper};
use crate::events::{
    EventDispatcher, JurisdictionSkippedEvent, LookupFinishedEvent, LookupKind,
    LookupStartedEvent, SearchCompletedEvent, VerificationEvent,
};
use crate::scrapers::Registry;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum lookups in flight at once.
    pub concurrency: usize,
    /// Bound on the whole search.
    pub deadline: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error(
        "no NPN found for {name} across {jurisdictions} jurisdictions; try the exact legal name or search a specific state"
    )]
    NoNpnFound { name: String, jurisdictions: usize },
}

type Accumulator = Arc<Mutex<Vec<(usize, LicenseResult)>>>;

pub struct MultiJurisdictionSearch {
    registry: Arc<Registry>,
    config: SearchConfig,
    events: EventDispatcher,
}

impl MultiJurisdictionSearch {
    pub fn new(registry: Arc<Registry>, config: SearchConfig) -> Self {
        Self {
            registry,
            config,
            events: EventDispatcher::with_logging(),
        }
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search every NPN-reporting jurisdiction by name and return one record
    /// per distinct NPN, in jurisdiction order.
    pub async fn find_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<LicenseResult>, SearchError> {
        let codes = self.registry.npn_search_codes();
        let adapters: Vec<Arc<dyn Scraper>> = codes
            .iter()
            .map(|code| self.registry.get_adapter(code))
            .collect();
        let jurisdictions = adapters.len();
        let started = Instant::now();

        let (collected, deadline_hit) = self.fan_out(ctx, first_name, last_name, adapters).await;
        let hits = collected.len();
        let unique = dedupe_by_npn(collected);

        self.events
            .dispatch(VerificationEvent::SearchCompleted(SearchCompletedEvent {
                jurisdictions,
                collected: hits,
                unique: unique.len(),
                deadline_hit,
                elapsed: started.elapsed(),
                timestamp: Utc::now(),
            }));

        if unique.is_empty() {
            return Err(SearchError::NoNpnFound {
                name: format!("{} {}", first_name.trim(), last_name.trim()),
                jurisdictions,
            });
        }
        Ok(unique)
    }

    /// Runs the bounded fan-out; returns hits in request order and whether the
    /// search was cut short.
    async fn fan_out(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
        adapters: Vec<Arc<dyn Scraper>>,
    ) -> (Vec<LicenseResult>, bool) {
        let search_ctx = ctx.child_with_timeout(self.config.deadline);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let collected: Accumulator = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = JoinSet::new();
        let mut task_states = HashMap::new();

        for (order, adapter) in adapters.into_iter().enumerate() {
            let state = adapter.state_code().to_string();
            let task = search_one(
                search_ctx.clone(),
                semaphore.clone(),
                adapter,
                first_name.to_string(),
                last_name.to_string(),
                order,
                collected.clone(),
                self.events.clone(),
            );
            let handle = tasks.spawn(task);
            task_states.insert(handle.id(), state);
        }

        let mut cut_short = false;
        loop {
            let next = search_ctx.run(tasks.join_next_with_id()).await;
            let joined = match next {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(reason) => {
                    log::warn!(
                        "NPN search stopped with {} lookups outstanding: {reason}",
                        tasks.len()
                    );
                    cut_short = true;
                    tasks.abort_all();
                    search_ctx.cancel();
                    break;
                }
            };

            match joined {
                Ok((_, Ok(_))) => {}
                Ok((id, Err(err))) => {
                    self.skip(task_states.get(&id).map(String::as_str), err.to_string());
                }
                Err(join_err) if join_err.is_panic() => {
                    self.skip(
                        task_states.get(&join_err.id()).map(String::as_str),
                        "lookup panicked".to_string(),
                    );
                }
                Err(join_err) => {
                    log::debug!("lookup task ended early: {join_err}");
                }
            }
        }

        // Dropping the set aborts anything still running.
        drop(tasks);

        let mut hits = std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner));
        hits.sort_by_key(|(order, _)| *order);
        (hits.into_iter().map(|(_, result)| result).collect(), cut_short)
    }

    fn skip(&self, state: Option<&str>, reason: String) {
        self.events
            .dispatch(VerificationEvent::JurisdictionSkipped(JurisdictionSkippedEvent {
                state: state.unwrap_or("??").to_string(),
                reason,
                timestamp: Utc::now(),
            }));
    }
}

#[allow(clippy::too_many_arguments)]
async fn search_one(
    ctx: LookupContext,
    semaphore: Arc<Semaphore>,
    adapter: Arc<dyn Scraper>,
    first_name: String,
    last_name: String,
    order: usize,
    collected: Accumulator,
    events: EventDispatcher,
) -> Result<usize, LookupError> {
    let state = adapter.state_code().to_string();
    let _permit = match ctx.run(semaphore.acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return Err(LookupError::interrupted(&state, Interrupted::Cancelled)),
        Err(reason) => return Err(LookupError::interrupted(&state, reason)),
    };

    events.dispatch(VerificationEvent::LookupStarted(LookupStartedEvent {
        state: state.clone(),
        kind: LookupKind::Name,
        timestamp: Utc::now(),
    }));
    let started = Instant::now();

    let results = adapter.lookup_by_name(&ctx, &first_name, &last_name).await?;

    let with_npn: Vec<LicenseResult> = results
        .iter()
        .filter(|result| result.found && !result.npn.is_empty())
        .cloned()
        .collect();
    let hits = with_npn.len();

    events.dispatch(VerificationEvent::LookupFinished(LookupFinishedEvent {
        state,
        kind: LookupKind::Name,
        records: results.len(),
        found: hits > 0,
        latency: started.elapsed(),
        timestamp: Utc::now(),
    }));

    if hits > 0 {
        collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(with_npn.into_iter().map(|result| (order, result)));
    }
    Ok(hits)
}

/// Keep the first record seen for each NPN, preserving input order.
pub fn dedupe_by_npn(results: Vec<LicenseResult>) -> Vec<LicenseResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|result| seen.insert(result.npn.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npn(npn: &str, name: &str) -> LicenseResult {
        LicenseResult {
            found: true,
            npn: npn.into(),
            full_name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let unique = dedupe_by_npn(vec![npn("1", "first"), npn("2", "two"), npn("1", "second")]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].full_name, "first");
        assert_eq!(unique[1].npn, "2");
    }

    #[test]
    fn default_config_matches_reference_values() {
        let config = SearchConfig::default();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.deadline, Duration::from_secs(120));
    }

    #[test]
    fn empty_error_suggests_narrowing() {
        let err = SearchError::NoNpnFound {
            name: "Jane Doe".into(),
            jurisdictions: 32,
        };
        let message = err.to_string();
        assert!(message.contains("across 32 jurisdictions"));
        assert!(message.contains("specific state"));
    }
}
