//! Event system for verification activity.
//!
//! Provides hooks for logging and custom reactions around lookups and
//! multi-jurisdiction searches.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What identifier a lookup searched by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Name,
    Npn,
    LicenseNumber,
}

#[derive(Debug, Clone)]
pub struct LookupStartedEvent {
    pub state: String,
    pub kind: LookupKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LookupFinishedEvent {
    pub state: String,
    pub kind: LookupKind,
    pub records: usize,
    pub found: bool,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LookupFailedEvent {
    pub state: String,
    pub kind: LookupKind,
    pub error: String,
    /// The lookup was cancelled or ran out of time rather than failing.
    pub interrupted: bool,
    pub timestamp: DateTime<Utc>,
}

/// A jurisdiction dropped from a multi-jurisdiction search.
#[derive(Debug, Clone)]
pub struct JurisdictionSkippedEvent {
    pub state: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SearchCompletedEvent {
    pub jurisdictions: usize,
    pub collected: usize,
    pub unique: usize,
    pub deadline_hit: bool,
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum VerificationEvent {
    LookupStarted(LookupStartedEvent),
    LookupFinished(LookupFinishedEvent),
    LookupFailed(LookupFailedEvent),
    JurisdictionSkipped(JurisdictionSkippedEvent),
    SearchCompleted(SearchCompletedEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &VerificationEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with a [`LoggingHandler`] already registered.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: VerificationEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &VerificationEvent) {
        match event {
            VerificationEvent::LookupStarted(started) => {
                log::debug!("-> {} lookup by {:?}", started.state, started.kind);
            }
            VerificationEvent::LookupFinished(done) => {
                log::debug!(
                    "<- {} {:?}: {} records, found={} ({:.2}s)",
                    done.state,
                    done.kind,
                    done.records,
                    done.found,
                    done.latency.as_secs_f64()
                );
            }
            VerificationEvent::LookupFailed(failed) if failed.interrupted => {
                log::info!(
                    "lookup {} by {:?} interrupted: {}",
                    failed.state,
                    failed.kind,
                    failed.error
                );
            }
            VerificationEvent::LookupFailed(failed) => {
                log::warn!(
                    "lookup {} by {:?} failed -> {}",
                    failed.state,
                    failed.kind,
                    failed.error
                );
            }
            VerificationEvent::JurisdictionSkipped(skipped) => {
                log::warn!("skipping {}: {}", skipped.state, skipped.reason);
            }
            VerificationEvent::SearchCompleted(search) => {
                log::info!(
                    "search over {} jurisdictions: {} hits, {} unique NPNs in {:.2}s{}",
                    search.jurisdictions,
                    search.collected,
                    search.unique,
                    search.elapsed.as_secs_f64(),
                    if search.deadline_hit { " (deadline hit)" } else { "" }
                );
            }
        }
    }
}
