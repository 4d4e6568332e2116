//! Texas Department of Insurance agent/adjuster lookup.
//!
//! Unlike California, the challenge key is rendered into the form page, so
//! the page is fetched before the challenge is solved.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::gated::{GatedFlow, GatedForm, SiteKeySource};
use super::html::RowLayout;
use crate::core::{CaptchaGated, LicenseResult, LookupContext, LookupResult, Scraper};
use crate::external_deps::captcha::CaptchaProvider;
use crate::session::SessionFactory;

pub const TEXAS_URL: &str = "https://txapps.texas.gov/NASApp/tdi/TdiARManager";

pub struct TexasScraper {
    flow: GatedFlow,
}

impl TexasScraper {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        solver: Option<Arc<dyn CaptchaProvider>>,
        page_url: Url,
    ) -> Self {
        let form = GatedForm {
            state: "TX",
            manual_url: page_url.to_string(),
            page_url,
            site_key: SiteKeySource::PageField("captchaToken"),
            last_name_field: "perlastName",
            first_name_field: "perfirstName",
            token_field: "captchaToken",
            csrf_field: None,
            extra_fields: &[("search", "Search")],
            // Name | License # | Status | License Type
            layout: RowLayout {
                min_cells: 2,
                name: 0,
                license_number: 1,
                license_type: Some(3),
                status: Some(2),
            },
        };
        Self {
            flow: GatedFlow::new(form, sessions, solver),
        }
    }
}

#[async_trait]
impl Scraper for TexasScraper {
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

impl CaptchaGated for TexasScraper {
    fn challenge_page(&self) -> &Url {
        self.flow.page_url()
    }

    fn solver_configured(&self) -> bool {
        self.flow.solver_configured()
    }
}
