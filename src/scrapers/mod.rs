//! Jurisdiction adapters and the registry that dispatches to them.
//!
//! Four families implement [`Scraper`](crate::core::Scraper):
//! - [`NaicScraper`]: one structured API covering many jurisdictions
//! - [`FloridaScraper`]: plain HTML form search with detail pages
//! - [`CaliforniaScraper`] / [`TexasScraper`]: searches behind a Turnstile challenge
//! - [`ManualScraper`]: everything else, pointing at a manual lookup page

pub mod california;
pub mod florida;
mod gated;
mod html;
pub mod manual;
pub mod naic;
pub mod registry;
pub mod texas;

pub use california::{CALIFORNIA_URL, CaliforniaScraper};
pub use florida::{FLORIDA_URL, FloridaScraper};
pub use manual::{DOI_DIRECTORY_URL, MANUAL_LOOKUP_URLS, ManualScraper, manual_url_for};
pub use naic::{NAIC_API_URL, NAIC_MANUAL_URL, NAIC_STATES, NaicScraper};
pub use registry::{AdapterConstructor, AdapterDeps, Registry};
pub use texas::{TEXAS_URL, TexasScraper};
