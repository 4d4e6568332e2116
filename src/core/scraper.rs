//! The capability every jurisdiction adapter implements.

use async_trait::async_trait;
use url::Url;

use super::context::LookupContext;
use super::error::LookupResult;
use super::types::LicenseResult;

/// Lookup capability for one jurisdiction.
///
/// Implementations never panic on bad input or bad upstream data. Transport,
/// challenge and parse failures are returned as `Err`; expected conditions
/// such as "not supported" or "not configured" come back as a single
/// `LicenseResult` with `found == false` and a non-empty `error`.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Canonical upper-case 2-letter code served by this adapter.
    fn state_code(&self) -> &str;

    async fn lookup_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>>;

    async fn lookup_by_npn(&self, ctx: &LookupContext, npn: &str)
    -> LookupResult<Vec<LicenseResult>>;

    async fn lookup_by_license_number(
        &self,
        ctx: &LookupContext,
        license_number: &str,
    ) -> LookupResult<Vec<LicenseResult>>;

    /// Human-usable fallback link for manual verification.
    fn manual_lookup_url(&self) -> &str;

    /// Whether name lookups return National Producer Numbers.
    fn reports_npn(&self) -> bool {
        false
    }

    /// Present only for adapters whose site sits behind a CAPTCHA challenge.
    fn as_captcha_gated(&self) -> Option<&dyn CaptchaGated> {
        None
    }
}

/// Marker for adapters that need the solver gateway to reach their site.
pub trait CaptchaGated: Send + Sync {
    /// Page whose challenge must be solved before searching.
    fn challenge_page(&self) -> &Url;

    /// `false` means lookups short-circuit to a "not configured" result.
    fn solver_configured(&self) -> bool;
}
