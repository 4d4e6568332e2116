//! # doi-scraper-rs
//!
//! Insurance producer license verification against state Department of
//! Insurance (DOI) records.
//!
//! Each jurisdiction is served by an adapter implementing [`Scraper`]. The
//! [`Registry`] resolves 2-letter codes to adapters, the [`MatchSelector`]
//! picks the best record of one lookup, and [`MultiJurisdictionSearch`] finds
//! a producer's NPN when the state is unknown.
//!
//! ## Features
//!
//! - NAIC State Based Systems API covering 31 jurisdictions
//! - HTML scraping with detail pages (Florida)
//! - Turnstile-gated searches (California, Texas) via CapSolver or 2Captcha
//! - Browser-fingerprinted sessions with per-sequence cookie jars
//! - Bounded-concurrency NPN discovery with an overall deadline
//! - Manual lookup links for every other jurisdiction
//!
//! ## Example
//!
//! ```no_run
//! use doi_scraper_rs::{LicenseVerifier, LookupContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let verifier = LicenseVerifier::from_env()?;
//!     let ctx = LookupContext::background();
//!     let license = verifier.verify(&ctx, "Jane", "Doe", "WI").await?;
//!     println!("{} {} active={}", license.full_name, license.npn, license.active);
//!     Ok(())
//! }
//! ```

mod verifier;

pub mod config;
pub mod core;
pub mod events;
pub mod external_deps;
pub mod matching;
pub mod scrapers;
pub mod search;
pub mod session;

pub use crate::verifier::{LicenseVerifier, VerifyError};

pub use crate::config::{ConfigError, Endpoints, VerifierConfig, VerifierConfigBuilder};

pub use crate::core::{
    CaptchaGated,
    Interrupted,
    LicenseResult,
    LookupContext,
    LookupError,
    LookupResult,
    Scraper,
    is_life_licensed,
};

pub use crate::events::{
    EventDispatcher,
    EventHandler,
    LoggingHandler,
    LookupKind,
    VerificationEvent,
};

pub use crate::external_deps::captcha::{
    CapSolverProvider,
    CaptchaConfig,
    CaptchaError,
    CaptchaProvider,
    CaptchaResult,
    CaptchaSolution,
    CaptchaTask,
    TwoCaptchaProvider,
};

pub use crate::matching::{MatchSelector, SelectError};

pub use crate::scrapers::{
    AdapterConstructor,
    AdapterDeps,
    CaliforniaScraper,
    FloridaScraper,
    ManualScraper,
    NaicScraper,
    Registry,
    TexasScraper,
};

pub use crate::search::{MultiJurisdictionSearch, SearchConfig, SearchError, dedupe_by_npn};

pub use crate::session::{
    BrowserProfile,
    BrowserSessionFactory,
    HttpSession,
    Ja3,
    ReqwestSession,
    SessionError,
    SessionFactory,
    SessionResponse,
    SessionResult,
    chrome_desktop_profile,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
