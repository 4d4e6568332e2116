//! California Department of Insurance individual name search.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::gated::{GatedFlow, GatedForm, SiteKeySource};
use super::html::RowLayout;
use crate::core::{CaptchaGated, LicenseResult, LookupContext, LookupResult, Scraper};
use crate::external_deps::captcha::CaptchaProvider;
use crate::session::SessionFactory;

pub const CALIFORNIA_URL: &str = "https://cdicloud.insurance.ca.gov/cal/";
const SEARCH_PATH: &str = "IndividualNameSearch";

// The site key is not rendered into the page before the challenge script runs.
const TURNSTILE_SITE_KEY: &str = "0x4AAAAAAAeV7o-X_350Kljk";

pub struct CaliforniaScraper {
    flow: GatedFlow,
}

impl CaliforniaScraper {
    /// `base_url` is the site root (`.../cal/`); the search page hangs off it.
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        solver: Option<Arc<dyn CaptchaProvider>>,
        mut base_url: Url,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let page_url = base_url.join(SEARCH_PATH).unwrap_or_else(|_| base_url.clone());
        let form = GatedForm {
            state: "CA",
            page_url,
            manual_url: base_url.to_string(),
            site_key: SiteKeySource::Static(TURNSTILE_SITE_KEY),
            last_name_field: "SearchLastName",
            first_name_field: "SearchFirstName",
            token_field: "cf-turnstile-response",
            csrf_field: Some("__RequestVerificationToken"),
            extra_fields: &[],
            // Name | License # | License Type | Status
            layout: RowLayout {
                min_cells: 3,
                name: 0,
                license_number: 1,
                license_type: Some(2),
                status: Some(3),
            },
        };
        Self {
            flow: GatedFlow::new(form, sessions, solver),
        }
    }
}

#[async_trait]
impl Scraper for CaliforniaScraper {
    fn state_code(&self) -> &str {
        self.flow.state()
    }

    async fn lookup_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        self.flow.search_by_name(ctx, first_name, last_name).await
    }

    async fn lookup_by_npn(
        &self,
        _ctx: &LookupContext,
        _npn: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        if !self.flow.solver_configured() {
            return Ok(vec![self.flow.not_configured()]);
        }
        Ok(vec![self.flow.unsupported("NPN search")])
    }

    async fn lookup_by_license_number(
        &self,
        _ctx: &LookupContext,
        _license_number: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        if !self.flow.solver_configured() {
            return Ok(vec![self.flow.not_configured()]);
        }
        Ok(vec![self.flow.unsupported("license number search")])
    }

    fn manual_lookup_url(&self) -> &str {
        self.flow.manual_url()
    }

    fn as_captcha_gated(&self) -> Option<&dyn CaptchaGated> {
        Some(self)
    }
}

impl CaptchaGated for CaliforniaScraper {
    fn challenge_page(&self) -> &Url {
        self.flow.page_url()
    }

    fn solver_configured(&self) -> bool {
        self.flow.solver_configured()
    }
}
