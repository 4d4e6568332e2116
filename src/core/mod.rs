//! Result model, lookup capability, and cancellation primitives shared by
//! adapters, the registry, and the search layers.

pub mod context;
pub mod error;
pub mod scraper;
pub mod types;

pub use context::{Interrupted, LookupContext};
pub use error::{LookupError, LookupResult};
pub use scraper::{CaptchaGated, Scraper};
pub use types::{LicenseResult, is_life_licensed};
