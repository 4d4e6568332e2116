//! Aggregator adapter backed by the NAIC State Based Systems license lookup
//! API, which answers for every jurisdiction listed in [`NAIC_STATES`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use super::html::{contains_ci, normalize_loas};
use crate::core::error::excerpt;
use crate::core::{LicenseResult, LookupContext, LookupError, LookupResult, Scraper};
use crate::session::{BrowserProfile, SessionFactory};

/// Jurisdictions answered by the NAIC SBS lookup API.
pub const NAIC_STATES: &[&str] = &[
    "AK", "AL", "AR", "AZ", "CT", "DC", "DE", "HI", "IA", "ID", "IL", "KS", "MA", "MD", "MO", "MT",
    "NC", "ND", "NE", "NH", "NJ", "NM", "OK", "OR", "RI", "SC", "SD", "TN", "VT", "WI", "WV",
];

pub const NAIC_API_URL: &str = "https://services.naic.org/api/licenseLookup/search";
pub const NAIC_MANUAL_URL: &str =
    "https://sbs.naic.org/solar/external/pages/#/search/licensee/search";
const NAIC_ORIGIN: &str = "https://sbs.naic.org";
const NAIC_REFERER: &str = "https://sbs.naic.org/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NaicRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    npn: String,
    #[serde(default)]
    license_number: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    license_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    license_effective_date: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    license_expiration_date: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    loas: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    residency: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    business_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    business_phone: String,
}

/// The API sends `null` for blank fields; treat it like a missing key.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct NaicErrorBody {
    #[serde(rename = "UnexpectedError", default)]
    unexpected_error: String,
}

/// NAIC lookups for one jurisdiction code.
pub struct NaicScraper {
    state: String,
    sessions: Arc<dyn SessionFactory>,
    profile: BrowserProfile,
    api_url: Url,
}

impl NaicScraper {
    pub fn new(sessions: Arc<dyn SessionFactory>, state: &str, api_url: Url) -> Self {
        Self {
            state: state.trim().to_uppercase(),
            sessions,
            profile: BrowserProfile::default(),
            api_url,
        }
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("jurisdiction", self.state.clone()),
            ("searchType", "Licensee".into()),
            ("entityType", "IND".into()),
        ]
    }

    async fn query(
        &self,
        ctx: &LookupContext,
        params: Vec<(&'static str, String)>,
    ) -> LookupResult<Vec<LicenseResult>> {
        let state = self.state.as_str();
        let session = self
            .sessions
            .new_session()
            .map_err(|source| LookupError::Session {
                state: state.to_string(),
                source,
            })?;

        let mut url = self.api_url.clone();
        url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        log::debug!("NAIC query: {url}");

        let headers = self
            .profile
            .json_headers(NAIC_ORIGIN, NAIC_REFERER)
            .map_err(|source| LookupError::Session {
                state: state.to_string(),
                source,
            })?;

        let response = ctx
            .run(session.get(&url, &headers))
            .await
            .map_err(|source| LookupError::interrupted(state, source))?
            .map_err(|source| LookupError::transport(state, "naic request", source))?;

        let body = response.text();
        if response.status != 200 {
            return Err(LookupError::Status {
                state: state.to_string(),
                step: "naic request",
                status: response.status,
                excerpt: excerpt(&body),
            });
        }

        parse_naic_body(state, &body)
    }
}

fn parse_naic_body(state: &str, body: &str) -> LookupResult<Vec<LicenseResult>> {
    if let Ok(error) = serde_json::from_str::<NaicErrorBody>(body)
        && !error.unexpected_error.is_empty()
    {
        return Err(LookupError::Api {
            state: state.to_string(),
            message: error.unexpected_error,
        });
    }

    let records: Vec<NaicRecord> = match serde_json::from_str(body) {
        Ok(records) => records,
        Err(err) => {
            log::debug!("NAIC {state}: unexpected body shape ({err}); treating as no match");
            return Ok(vec![LicenseResult::not_found(state)]);
        }
    };

    if records.is_empty() {
        return Ok(vec![LicenseResult::not_found(state)]);
    }

    Ok(records
        .into_iter()
        .map(|record| to_license_result(state, record))
        .collect())
}

fn to_license_result(state: &str, record: NaicRecord) -> LicenseResult {
    LicenseResult {
        found: true,
        // NAIC folds the status into the license type, e.g. "Producer - Active".
        active: contains_ci(&record.license_type, "active"),
        resident: record.residency.trim().eq_ignore_ascii_case("yes"),
        full_name: record.name,
        license_number: json_scalar(&record.license_number),
        npn: record.npn,
        state: state.to_string(),
        status: record.license_type.clone(),
        license_type: record.license_type,
        expiration_date: record.license_expiration_date,
        issue_date: record.license_effective_date,
        loas: normalize_loas(&record.loas),
        business_address: record.business_address,
        business_phone: record.business_phone,
        ..Default::default()
    }
}

fn json_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl Scraper for NaicScraper {
    fn state_code(&self) -> &str {
        &self.state
    }

    async fn lookup_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        let mut params = self.base_params();
        params.push(("firstName", first_name.trim().to_string()));
        params.push(("lastName", last_name.trim().to_string()));
        self.query(ctx, params).await
    }

    async fn lookup_by_npn(
        &self,
        ctx: &LookupContext,
        npn: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        let mut params = self.base_params();
        params.push(("npn", npn.trim().to_string()));
        self.query(ctx, params).await
    }

    async fn lookup_by_license_number(
        &self,
        ctx: &LookupContext,
        license_number: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        let mut params = self.base_params();
        params.push(("licenseNumber", license_number.trim().to_string()));
        self.query(ctx, params).await
    }

    fn manual_lookup_url(&self) -> &str {
        NAIC_MANUAL_URL
    }

    fn reports_npn(&self) -> bool {
        true
    }
}
