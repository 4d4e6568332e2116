//! Florida Department of Financial Services licensee search.
//!
//! The search is a two-step form flow on one session: GET the landing page to
//! obtain cookies, then POST the full filter form. Each result row links to a
//! detail page carrying the NPN, contact data and license panels, which is
//! fetched on the same session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use super::html::{CELLS, LINKS, MAX_RESULT_ROWS, contains_ci, element_text, selector};
use crate::core::{LicenseResult, LookupContext, LookupError, LookupResult, Scraper};
use crate::session::{BrowserProfile, HttpSession, SessionFactory};

pub const FLORIDA_URL: &str = "https://licenseesearch.fldfs.com/";
const STATE: &str = "FL";

static RESULTS_TABLE: Lazy<Selector> = Lazy::new(|| selector("table.table"));
static TBODY_ROWS: Lazy<Selector> = Lazy::new(|| selector("tbody tr"));
static FORM_GROUPS: Lazy<Selector> = Lazy::new(|| selector("div.form-group"));
static LABELS: Lazy<Selector> = Lazy::new(|| selector("label"));
static PANELS: Lazy<Selector> = Lazy::new(|| selector("div.panel"));
static PANEL_HEADING: Lazy<Selector> = Lazy::new(|| selector("div.panel-heading"));

/// Which identifier a search filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchFilter<'a> {
    Name { first: &'a str, last: &'a str },
    Npn(&'a str),
    LicenseNumber(&'a str),
}

/// Row on the search results page before the detail page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultRow {
    full_name: String,
    license_number: String,
    detail_path: String,
}

#[derive(Debug)]
enum SearchPage {
    NoResults,
    Rows(Vec<ResultRow>),
}

/// Fields scraped from one licensee detail page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct LicenseeDetail {
    npn: String,
    email: String,
    phone: String,
    business_address: String,
    county: String,
    license_type: String,
    issue_date: String,
    status: String,
    expiration: String,
}

#[derive(Debug, Clone)]
struct PanelLicense {
    license_type: String,
    issue_date: String,
    valid: bool,
}

pub struct FloridaScraper {
    sessions: Arc<dyn SessionFactory>,
    profile: BrowserProfile,
    base_url: Url,
}

impl FloridaScraper {
    pub fn new(sessions: Arc<dyn SessionFactory>, base_url: Url) -> Self {
        Self {
            sessions,
            profile: BrowserProfile::default(),
            base_url,
        }
    }

    async fn search(
        &self,
        ctx: &LookupContext,
        filter: SearchFilter<'_>,
    ) -> LookupResult<Vec<LicenseResult>> {
        let session = self
            .sessions
            .new_session()
            .map_err(|source| LookupError::Session {
                state: STATE.into(),
                source,
            })?;

        let headers = self
            .profile
            .navigation_headers(None)
            .map_err(|source| LookupError::Session {
                state: STATE.into(),
                source,
            })?;
        let landing = ctx
            .run(session.get(&self.base_url, &headers))
            .await
            .map_err(|source| LookupError::interrupted(STATE, source))?
            .map_err(|source| LookupError::transport(STATE, "landing page", source))?;
        if landing.status != 200 {
            return Ok(vec![LicenseResult::with_error(
                STATE,
                format!("HTTP {} on GET", landing.status),
            )]);
        }

        let origin = self.base_url.origin().ascii_serialization();
        let headers = self
            .profile
            .form_headers(self.base_url.as_str(), &origin)
            .map_err(|source| LookupError::Session {
                state: STATE.into(),
                source,
            })?;
        let response = ctx
            .run(session.post_form(&self.base_url, &headers, &search_form(filter)))
            .await
            .map_err(|source| LookupError::interrupted(STATE, source))?
            .map_err(|source| LookupError::transport(STATE, "search post", source))?;
        if response.status != 200 {
            return Ok(vec![LicenseResult::with_error(
                STATE,
                format!("HTTP {} on POST", response.status),
            )]);
        }

        let rows = match parse_search_page(&response.text()) {
            SearchPage::NoResults => {
                log::debug!("FL: no results");
                return Ok(vec![LicenseResult::not_found(STATE)]);
            }
            SearchPage::Rows(rows) => rows,
        };

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let detail = self.fetch_detail(ctx, session.as_ref(), &row.detail_path).await?;
            results.push(LicenseResult {
                found: true,
                active: detail.status.eq_ignore_ascii_case("VALID"),
                full_name: row.full_name,
                license_number: row.license_number,
                npn: detail.npn,
                state: STATE.into(),
                license_type: detail.license_type,
                status: detail.status,
                expiration_date: detail.expiration,
                issue_date: detail.issue_date,
                business_address: detail.business_address,
                business_phone: detail.phone,
                email: detail.email,
                county: detail.county,
                ..Default::default()
            });
        }

        if results.is_empty() {
            return Ok(vec![LicenseResult::not_found(STATE)]);
        }
        log::info!("FL: found {} results", results.len());
        Ok(results)
    }

    /// Detail failures only blank that row's descriptive fields; interruption
    /// still aborts the lookup.
    async fn fetch_detail(
        &self,
        ctx: &LookupContext,
        session: &dyn HttpSession,
        detail_path: &str,
    ) -> LookupResult<LicenseeDetail> {
        let url = match self.base_url.join(detail_path) {
            Ok(url) => url,
            Err(err) => {
                log::warn!("FL detail link '{detail_path}' invalid: {err}");
                return Ok(LicenseeDetail::default());
            }
        };

        let headers = match self.profile.navigation_headers(Some(self.base_url.as_str())) {
            Ok(headers) => headers,
            Err(err) => {
                log::warn!("FL detail headers: {err}");
                return Ok(LicenseeDetail::default());
            }
        };

        let response = ctx
            .run(session.get(&url, &headers))
            .await
            .map_err(|source| LookupError::interrupted(STATE, source))?;

        match response {
            Ok(response) if response.status == 200 => Ok(parse_detail_page(&response.text())),
            Ok(response) => {
                log::warn!("FL detail {url}: HTTP {}", response.status);
                Ok(LicenseeDetail::default())
            }
            Err(err) => {
                log::warn!("FL detail {url} failed: {err}");
                Ok(LicenseeDetail::default())
            }
        }
    }
}

/// The full POST payload the Florida search form submits.
fn search_form(filter: SearchFilter<'_>) -> Vec<(String, String)> {
    let (first, last, license_number, npn) = match filter {
        SearchFilter::Name { first, last } => (first.trim(), last.trim(), "", ""),
        SearchFilter::Npn(npn) => ("", "", "", npn.trim()),
        SearchFilter::LicenseNumber(number) => ("", "", number.trim(), ""),
    };

    [
        ("IndividualFNameFilter", first),
        ("IndividualLNameFilter", last),
        ("IndividualMNameFilter", ""),
        ("EmailAddressBeginContainFilter", "1"),
        ("EmailFilter", ""),
        ("FirmNameBeginContainFilter", "1"),
        ("FirmNameFilter", ""),
        ("ResidentStatusFilter", ""),
        ("FLLicenseNoFilter", license_number),
        ("NPNNoFilter", npn),
        ("LicenseStatusFilter", "1"),
        ("LicenseCategoryFilter", ""),
        ("LicenseIssueDateFromFilter", ""),
        ("LicenseIssueDateToFilter", ""),
        ("OnlyLicWithNoQuApptFilter", "false"),
        ("BusinessStateFilter", ""),
        ("BusinessCityFilter", ""),
        ("BusinessCountyFilter", ""),
        ("BusinessZipFilter", ""),
        ("CEDueDtFromFilter", ""),
        ("CEDueDtToFilter", ""),
        ("CEHrsNotMetFilter", "false"),
        ("AppointingEntityTYCLFilter", ""),
        ("AppointingEntityStatusFilter", ""),
        ("AppointingEntityStatusDateFromFilter", ""),
        ("AppointingEntityStatusDateToFilter", ""),
        ("LicenseeSearchInfo.PagingInfo.SortBy", "Name"),
        ("LicenseeSearchInfo.PagingInfo.SortDesc", "False"),
        ("LicenseeSearchInfo.PagingInfo.CurrentPage", "1"),
        ("AppointingEntityIdFilter", ""),
        ("AppointingEntityDisplayName", ""),
        ("TabLLValue", "0"),
        ("TabCEValue", "0"),
        ("TabAppValue", ""),
        ("hdnLApptEntitySearchListUrl", "/Home/GetAppointingEntityListForSearch"),
        ("hdnLicenseeSearchListUrl", "/Home/GetLicenseeSearchListPartialView"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

fn parse_search_page(body: &str) -> SearchPage {
    if contains_ci(body, "no licensee") || contains_ci(body, "no results") {
        return SearchPage::NoResults;
    }

    let document = Html::parse_document(body);
    let Some(table) = document.select(&RESULTS_TABLE).next() else {
        log::debug!("FL: results table missing");
        return SearchPage::NoResults;
    };

    let rows: Vec<ResultRow> = table
        .select(&TBODY_ROWS)
        .filter_map(|row| {
            let cells: Vec<_> = row.select(&CELLS).collect();
            if cells.len() < 2 {
                return None;
            }
            let link = cells[0].select(&LINKS).next()?;
            let detail_path = link.value().attr("href")?.to_string();
            Some(ResultRow {
                full_name: element_text(link),
                license_number: element_text(cells[1]),
                detail_path,
            })
        })
        .take(MAX_RESULT_ROWS)
        .collect();

    if rows.is_empty() {
        SearchPage::NoResults
    } else {
        SearchPage::Rows(rows)
    }
}

/// Label/value pairs live in `div.form-group` blocks; license status is given
/// by which panel (Valid or Invalid Licenses) lists the license.
fn parse_detail_page(body: &str) -> LicenseeDetail {
    let document = Html::parse_document(body);

    let mut fields: HashMap<String, String> = HashMap::new();
    for group in document.select(&FORM_GROUPS) {
        let Some(label) = group.select(&LABELS).next() else {
            continue;
        };
        let Some(value) = label
            .next_siblings()
            .find_map(scraper::ElementRef::wrap)
            .map(element_text)
        else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let key = element_text(label)
            .trim_end_matches(':')
            .to_lowercase()
            .replace(' ', "_")
            .replace('#', "num");
        fields.insert(key, value);
    }

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    let mut expiration = String::new();

    for panel in document.select(&PANELS) {
        let Some(heading) = panel.select(&PANEL_HEADING).next() else {
            continue;
        };
        let heading = element_text(heading).to_lowercase();
        let rows: Vec<Vec<String>> = panel
            .select(&TBODY_ROWS)
            .map(|row| row.select(&CELLS).map(element_text).collect())
            .collect();

        if heading.contains("appointment") {
            // Company | Issue Date | Expiration Date | Status Date
            if expiration.is_empty()
                && let Some(date) = rows
                    .iter()
                    .filter_map(|cells| cells.get(2))
                    .find(|date| !date.is_empty())
            {
                expiration = date.clone();
            }
            continue;
        }

        let is_invalid = heading.contains("invalid license");
        let is_valid = !is_invalid && heading.contains("valid license");
        if !is_valid && !is_invalid {
            continue;
        }

        for cells in rows.into_iter().filter(|cells| cells.len() >= 2) {
            let license = PanelLicense {
                license_type: cells[0].clone(),
                issue_date: cells[1].clone(),
                valid: is_valid,
            };
            if is_valid {
                valid.push(license);
            } else {
                invalid.push(license);
            }
        }
    }

    let chosen = valid
        .iter()
        .find(|license| {
            contains_ci(&license.license_type, "life") || contains_ci(&license.license_type, "health")
        })
        .or_else(|| valid.first())
        .or_else(|| invalid.first());

    let mut detail = LicenseeDetail {
        npn: fields.remove("npn_num").unwrap_or_default(),
        email: fields.remove("email").unwrap_or_default(),
        phone: fields.remove("phone").unwrap_or_default(),
        business_address: fields.remove("business_address").unwrap_or_default(),
        county: fields.remove("county").unwrap_or_default(),
        expiration,
        ..Default::default()
    };
    if let Some(license) = chosen {
        detail.license_type = license.license_type.clone();
        detail.issue_date = license.issue_date.clone();
        detail.status = if license.valid { "VALID" } else { "INVALID" }.into();
    }
    detail
}

#[async_trait]
impl Scraper for FloridaScraper {
    fn state_code(&self) -> &str {
        STATE
    }

    async fn lookup_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        log::debug!("FL lookup: {first_name} {last_name}");
        self.search(
            ctx,
            SearchFilter::Name {
                first: first_name,
                last: last_name,
            },
        )
        .await
    }

    async fn lookup_by_npn(
        &self,
        ctx: &LookupContext,
        npn: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        log::debug!("FL NPN lookup: {npn}");
        self.search(ctx, SearchFilter::Npn(npn)).await
    }

    async fn lookup_by_license_number(
        &self,
        ctx: &LookupContext,
        license_number: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        log::debug!("FL license# lookup: {license_number}");
        self.search(ctx, SearchFilter::LicenseNumber(license_number))
            .await
    }

    fn manual_lookup_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn reports_npn(&self) -> bool {
        true
    }
}
