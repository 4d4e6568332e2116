//! Multi-jurisdiction NPN discovery with fake adapters.

mod common;

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use doi_scraper_rs::{
    AdapterDeps, Endpoints, EventDispatcher, EventHandler, LicenseResult, LicenseVerifier,
    LookupContext, LookupError, LookupKind, LookupResult, MultiJurisdictionSearch, Registry,
    Scraper, SearchConfig, SearchError, VerificationEvent, VerifierConfig, VerifyError,
};
use tokio::time::Instant;

use common::CountingSessions;

#[derive(Clone, Copy)]
enum Behavior {
    Hit { npn: &'static str, delay_ms: u64 },
    Miss,
    Fail,
    Panic,
    Hang,
}

struct FakeScraper {
    state: String,
    behavior: Behavior,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Scraper for FakeScraper {
    fn state_code(&self) -> &str {
        &self.state
    }

    async fn lookup_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.behavior {
            Behavior::Hit { npn, delay_ms } => {
                let slept = ctx.sleep(Duration::from_millis(delay_ms)).await;
                slept
                    .map(|_| {
                        vec![LicenseResult {
                            found: true,
                            active: true,
                            npn: npn.to_string(),
                            full_name: format!("{last_name}, {first_name}"),
                            state: self.state.clone(),
                            ..Default::default()
                        }]
                    })
                    .map_err(|reason| LookupError::Interrupted {
                        state: self.state.clone(),
                        source: reason,
                    })
            }
            Behavior::Miss => Ok(vec![LicenseResult::not_found(self.state.clone())]),
            Behavior::Fail => Err(LookupError::Api {
                state: self.state.clone(),
                message: "upstream exploded".into(),
            }),
            Behavior::Panic => panic!("adapter bug"),
            Behavior::Hang => std::future::pending::<LookupResult<Vec<LicenseResult>>>().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn lookup_by_npn(&self, _: &LookupContext, _: &str) -> LookupResult<Vec<LicenseResult>> {
        Ok(vec![LicenseResult::not_found(self.state.clone())])
    }

    async fn lookup_by_license_number(
        &self,
        _: &LookupContext,
        _: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        Ok(vec![LicenseResult::not_found(self.state.clone())])
    }

    fn manual_lookup_url(&self) -> &str {
        "https://example.gov/manual"
    }

    fn reports_npn(&self) -> bool {
        true
    }
}

struct Fixture {
    registry: Arc<Registry>,
    peak: Arc<AtomicUsize>,
}

fn fixture(jurisdictions: &[(&str, Behavior)]) -> Fixture {
    let mut registry = Registry::empty(
        Arc::new(CountingSessions::default()),
        None,
        Endpoints::default(),
    );
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for (code, behavior) in jurisdictions {
        let state = code.to_string();
        let behavior = *behavior;
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        registry.register(
            code,
            Box::new(move |_: &AdapterDeps| -> Arc<dyn Scraper> {
                Arc::new(FakeScraper {
                    state: state.clone(),
                    behavior,
                    in_flight: in_flight.clone(),
                    peak: peak.clone(),
                })
            }),
        );
    }

    Fixture {
        registry: Arc::new(registry),
        peak,
    }
}

fn codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|idx| format!("{}{}", (b'A' + (idx / 26) as u8) as char, (b'A' + (idx % 26) as u8) as char))
        .collect()
}

#[tokio::test]
async fn never_exceeds_concurrency_limit() {
    let codes = codes(15);
    let jurisdictions: Vec<(&str, Behavior)> = codes
        .iter()
        .map(|code| (code.as_str(), Behavior::Hit { npn: "1", delay_ms: 30 }))
        .collect();
    let fixture = fixture(&jurisdictions);

    let search = MultiJurisdictionSearch::new(fixture.registry.clone(), SearchConfig::default());
    let results = search
        .find_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("results");

    assert_eq!(results.len(), 1);
    let peak = fixture.peak.load(Ordering::SeqCst);
    assert!(peak <= 10, "peak in-flight lookups was {peak}");
    assert!(peak > 1, "lookups should overlap");
}

#[tokio::test]
async fn deadline_returns_partial_results() {
    let fixture = fixture(&[
        ("AA", Behavior::Hit { npn: "111", delay_ms: 0 }),
        ("BB", Behavior::Hang),
        ("CC", Behavior::Hang),
    ]);
    let config = SearchConfig {
        concurrency: 10,
        deadline: Duration::from_millis(200),
    };
    let search = MultiJurisdictionSearch::new(fixture.registry.clone(), config);

    let started = Instant::now();
    let results = search
        .find_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("partial results");

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].npn, "111");
}

#[tokio::test]
async fn dedup_keeps_first_jurisdiction_in_order() {
    let fixture = fixture(&[
        ("AA", Behavior::Hit { npn: "1", delay_ms: 80 }),
        ("BB", Behavior::Hit { npn: "2", delay_ms: 0 }),
        ("CC", Behavior::Hit { npn: "1", delay_ms: 0 }),
    ]);
    let search = MultiJurisdictionSearch::new(fixture.registry.clone(), SearchConfig::default());
    let results = search
        .find_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("results");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].npn, "1");
    assert_eq!(results[0].state, "AA", "first by request order, not completion");
    assert_eq!(results[1].npn, "2");
}

#[tokio::test]
async fn failures_and_panics_are_skipped() {
    let fixture = fixture(&[
        ("AA", Behavior::Fail),
        ("BB", Behavior::Panic),
        ("CC", Behavior::Miss),
        ("DD", Behavior::Hit { npn: "42", delay_ms: 10 }),
    ]);
    let search = MultiJurisdictionSearch::new(fixture.registry.clone(), SearchConfig::default());
    let results = search
        .find_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("results");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].state, "DD");
}

#[tokio::test]
async fn empty_search_reports_jurisdiction_count() {
    let fixture = fixture(&[("AA", Behavior::Miss), ("BB", Behavior::Fail)]);
    let search = MultiJurisdictionSearch::new(fixture.registry.clone(), SearchConfig::default());
    let err = search
        .find_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SearchError::NoNpnFound {
            name: "Jane Doe".into(),
            jurisdictions: 2,
        }
    );
}

#[tokio::test]
async fn verifier_dispatches_single_state_and_search() {
    let fixture = fixture(&[
        ("AA", Behavior::Hit { npn: "7", delay_ms: 0 }),
        ("BB", Behavior::Hit { npn: "8", delay_ms: 0 }),
    ]);
    let verifier = LicenseVerifier::with_registry(VerifierConfig::default(), fixture.registry.clone());
    let ctx = LookupContext::background();

    let single = verifier.find_npn(&ctx, "Jane", "Doe", Some("bb")).await.expect("single");
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].npn, "8");

    let all = verifier.find_npn(&ctx, "Jane", "Doe", None).await.expect("all");
    assert_eq!(all.iter().map(|r| r.npn.as_str()).collect::<Vec<_>>(), vec!["7", "8"]);

    let best = verifier.verify(&ctx, "Jane", "Doe", "AA").await.expect("verified");
    assert_eq!(best.npn, "7");

    let err = verifier.verify(&ctx, "Jane", "Doe", "Z").await.unwrap_err();
    assert!(matches!(err, VerifyError::InvalidState(_)));
}

#[derive(Default)]
struct Recorder(Mutex<Vec<VerificationEvent>>);

impl EventHandler for Recorder {
    fn handle(&self, event: &VerificationEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn verifier_reports_lookup_kind_in_events() {
    let fixture = fixture(&[("AA", Behavior::Miss)]);
    let recorder = Arc::new(Recorder::default());
    let mut events = EventDispatcher::new();
    events.register_handler(recorder.clone());
    let verifier = LicenseVerifier::with_registry(VerifierConfig::default(), fixture.registry.clone())
        .with_events(events);
    let ctx = LookupContext::background();

    let by_npn = verifier.lookup_npn(&ctx, "123", "aa").await.expect("npn lookup");
    assert!(!by_npn[0].found);
    verifier
        .lookup_license_number(&ctx, "L-1", "AA")
        .await
        .expect("license lookup");

    let kinds: Vec<LookupKind> = recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            VerificationEvent::LookupStarted(started) => Some(started.kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![LookupKind::Npn, LookupKind::LicenseNumber]);
}

#[tokio::test]
async fn verifier_times_out_hung_adapter() {
    let fixture = fixture(&[("AA", Behavior::Hang)]);
    let recorder = Arc::new(Recorder::default());
    let mut events = EventDispatcher::new();
    events.register_handler(recorder.clone());
    let config = VerifierConfig::builder()
        .with_lookup_timeout(Duration::from_millis(100))
        .build();
    let verifier =
        LicenseVerifier::with_registry(config, fixture.registry.clone()).with_events(events);

    let err = verifier
        .verify(&LookupContext::background(), "Jane", "Doe", "AA")
        .await
        .unwrap_err();
    match &err {
        VerifyError::Unavailable { state, source, .. } => {
            assert_eq!(state, "AA");
            assert!(source.is_interrupted(), "{source}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.manual_lookup_url(), Some("https://example.gov/manual"));

    let failed = recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .find_map(|event| match event {
            VerificationEvent::LookupFailed(failed) => Some(failed.clone()),
            _ => None,
        })
        .expect("failure event");
    assert!(failed.interrupted);
    assert_eq!(failed.kind, LookupKind::Name);
}
