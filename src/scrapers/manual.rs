//! Fallback adapter for jurisdictions with no automatable lookup path.

use async_trait::async_trait;

use crate::core::{LicenseResult, LookupContext, LookupResult, Scraper};

/// State insurance department directory, used for valid codes that have no
/// dedicated manual search page.
pub const DOI_DIRECTORY_URL: &str = "https://content.naic.org/state-insurance-departments";

const SIRCON_URL: &str = "https://sircon.com/ComplianceExpress/";

/// Manual lookup pages for states without an automated adapter.
pub const MANUAL_LOOKUP_URLS: &[(&str, &str)] = &[
    ("CO", SIRCON_URL),
    ("GA", SIRCON_URL),
    ("IN", SIRCON_URL),
    ("KY", "https://insurance.ky.gov/ppc/agentlookup.aspx"),
    ("LA", "https://www.ldi.la.gov/producers/agent-search"),
    ("ME", "https://www.maine.gov/pfr/insurance/licensee-search"),
    ("MI", "https://difs.state.mi.us/Licensees/"),
    ("MN", SIRCON_URL),
    ("MS", "https://www.mid.ms.gov/licensing/agent-search.aspx"),
    ("NV", "https://doi.nv.gov/Licensing/Agent_Lookup/"),
    (
        "NY",
        "https://myportal.dfs.ny.gov/web/guest/individual-or-entity-look-up",
    ),
    ("OH", "https://gateway.insurance.ohio.gov/UI/ODI.Agent.Public/"),
    ("PA", SIRCON_URL),
    ("UT", "https://insurance.utah.gov/licensee-search/"),
    ("VA", "https://scc.virginia.gov/pages/Bureau-of-Insurance"),
    ("WA", "https://www.insurance.wa.gov/agent-broker-search"),
    ("WY", SIRCON_URL),
];

/// Manual lookup URL for `code`: the state's own page, the DOI directory for
/// any other 2-letter code, or empty for codes that cannot be a state.
pub fn manual_url_for(code: &str) -> &'static str {
    if let Some((_, url)) = MANUAL_LOOKUP_URLS.iter().find(|(state, _)| *state == code) {
        return url;
    }
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        DOI_DIRECTORY_URL
    } else {
        ""
    }
}

#[derive(Debug, Clone)]
pub struct ManualScraper {
    state: String,
    lookup_url: String,
}

impl ManualScraper {
    pub fn new(state: impl Into<String>, lookup_url: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            lookup_url: lookup_url.into(),
        }
    }

    /// Manual adapter for `code` with the URL from [`manual_url_for`].
    pub fn for_code(code: &str) -> Self {
        Self::new(code, manual_url_for(code))
    }

    fn manual_result(&self) -> Vec<LicenseResult> {
        let mut message = format!("no automated lookup for {}", self.state);
        if !self.lookup_url.is_empty() {
            message.push_str("; verify manually at ");
            message.push_str(&self.lookup_url);
        }
        vec![LicenseResult::with_error(self.state.clone(), message)]
    }
}

#[async_trait]
impl Scraper for ManualScraper {
    fn state_code(&self) -> &str {
        &self.state
    }

    async fn lookup_by_name(
        &self,
        _ctx: &LookupContext,
        _first_name: &str,
        _last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        Ok(self.manual_result())
    }

    async fn lookup_by_npn(
        &self,
        _ctx: &LookupContext,
        _npn: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        Ok(self.manual_result())
    }

    async fn lookup_by_license_number(
        &self,
        _ctx: &LookupContext,
        _license_number: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        Ok(self.manual_result())
    }

    fn manual_lookup_url(&self) -> &str {
        &self.lookup_url
    }
}
