//! Jurisdiction code to adapter dispatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use super::california::CaliforniaScraper;
use super::florida::FloridaScraper;
use super::manual::ManualScraper;
use super::naic::{NAIC_STATES, NaicScraper};
use super::texas::TexasScraper;
use crate::config::Endpoints;
use crate::core::Scraper;
use crate::external_deps::captcha::CaptchaProvider;
use crate::session::SessionFactory;

/// Shared handles every adapter constructor closes over.
#[derive(Clone)]
pub struct AdapterDeps {
    pub sessions: Arc<dyn SessionFactory>,
    pub solver: Option<Arc<dyn CaptchaProvider>>,
    pub endpoints: Endpoints,
}

pub type AdapterConstructor = Box<dyn Fn(&AdapterDeps) -> Arc<dyn Scraper> + Send + Sync>;

/// Maps 2-letter jurisdiction codes to adapters.
///
/// Adapters are built on first use and cached, so every lookup of the same
/// code (in any case, with surrounding whitespace) returns the same instance.
/// Codes without a registered constructor resolve to a [`ManualScraper`].
pub struct Registry {
    deps: AdapterDeps,
    constructors: BTreeMap<String, AdapterConstructor>,
    cache: RwLock<HashMap<String, Arc<dyn Scraper>>>,
}

impl Registry {
    /// Registry with every built-in jurisdiction against the public sites.
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        solver: Option<Arc<dyn CaptchaProvider>>,
    ) -> Self {
        Self::with_endpoints(sessions, solver, Endpoints::default())
    }

    pub fn with_endpoints(
        sessions: Arc<dyn SessionFactory>,
        solver: Option<Arc<dyn CaptchaProvider>>,
        endpoints: Endpoints,
    ) -> Self {
        let mut registry = Self::empty(sessions, solver, endpoints);

        for code in NAIC_STATES {
            registry.register(
                code,
                Box::new(move |deps: &AdapterDeps| -> Arc<dyn Scraper> {
                    Arc::new(NaicScraper::new(
                        deps.sessions.clone(),
                        code,
                        deps.endpoints.naic_api.clone(),
                    ))
                }),
            );
        }
        registry.register(
            "FL",
            Box::new(|deps: &AdapterDeps| -> Arc<dyn Scraper> {
                Arc::new(FloridaScraper::new(
                    deps.sessions.clone(),
                    deps.endpoints.florida.clone(),
                ))
            }),
        );
        registry.register(
            "CA",
            Box::new(|deps: &AdapterDeps| -> Arc<dyn Scraper> {
                Arc::new(CaliforniaScraper::new(
                    deps.sessions.clone(),
                    deps.solver.clone(),
                    deps.endpoints.california.clone(),
                ))
            }),
        );
        registry.register(
            "TX",
            Box::new(|deps: &AdapterDeps| -> Arc<dyn Scraper> {
                Arc::new(TexasScraper::new(
                    deps.sessions.clone(),
                    deps.solver.clone(),
                    deps.endpoints.texas.clone(),
                ))
            }),
        );

        registry
    }

    /// Registry without any automated jurisdiction; every code resolves to a
    /// manual adapter until constructors are registered.
    pub fn empty(
        sessions: Arc<dyn SessionFactory>,
        solver: Option<Arc<dyn CaptchaProvider>>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            deps: AdapterDeps {
                sessions,
                solver,
                endpoints,
            },
            constructors: BTreeMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace the constructor for `code`.
    pub fn register(&mut self, code: &str, constructor: AdapterConstructor) {
        let code = normalize_code(code);
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&code);
        self.constructors.insert(code, constructor);
    }

    pub fn get_adapter(&self, code: &str) -> Arc<dyn Scraper> {
        let code = normalize_code(code);

        if let Some(adapter) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&code)
        {
            return adapter.clone();
        }

        let built = match self.constructors.get(&code) {
            Some(constructor) => constructor(&self.deps),
            None => {
                log::debug!("no automated adapter for '{code}', using manual fallback");
                Arc::new(ManualScraper::for_code(&code))
            }
        };

        // Another caller may have raced us here; the first insert wins.
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(code)
            .or_insert(built)
            .clone()
    }

    pub fn is_automatable(&self, code: &str) -> bool {
        self.constructors.contains_key(&normalize_code(code))
    }

    /// Codes with a registered constructor, sorted.
    pub fn automatable_codes(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Sorted codes whose adapters return NPNs from name lookups.
    pub fn npn_search_codes(&self) -> Vec<String> {
        self.constructors
            .keys()
            .filter(|code| self.get_adapter(code).reports_npn())
            .cloned()
            .collect()
    }

    pub fn solver_configured(&self) -> bool {
        self.deps.solver.is_some()
    }
}

pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
