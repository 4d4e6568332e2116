//! Core data structures shared by every jurisdiction adapter and the policies
//! applied to their output.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Normalized outcome of one license record lookup.
///
/// Descriptive fields are best-effort per source; an empty string means the
/// source did not provide the value. `active` and every descriptive field are
/// meaningless unless `found` is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseResult {
    pub found: bool,
    pub active: bool,
    pub resident: bool,
    pub full_name: String,
    pub license_number: String,
    pub npn: String,
    pub state: String,
    pub license_type: String,
    pub status: String,
    pub expiration_date: String,
    pub issue_date: String,
    pub loas: String,
    pub business_address: String,
    pub business_phone: String,
    pub email: String,
    pub county: String,
    /// Set only when this record could not be looked up (partial failure).
    pub error: String,
}

const EXPIRATION_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%m/%d/%y", "%m-%d-%Y"];

impl LicenseResult {
    /// A "looked and found nothing" record for `state`.
    pub fn not_found(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..Self::default()
        }
    }

    /// A not-found record carrying an explanation for the caller.
    pub fn with_error(state: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Active license whose type or lines of authority mention life insurance.
    pub fn is_life_licensed(&self) -> bool {
        if !self.active {
            return false;
        }
        let combined = format!("{} {}", self.license_type, self.loas).to_lowercase();
        combined.contains("life")
    }

    /// Parsed expiration date, if the source provided one in a known format.
    pub fn expiration(&self) -> Option<NaiveDate> {
        let raw = self.expiration_date.trim();
        if raw.is_empty() {
            return None;
        }

        for format in EXPIRATION_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
                return Some(date);
            }
        }

        // Some APIs return a full timestamp such as 2026-03-31T00:00:00.
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .map(|dt| dt.date())
            .ok()
    }

    /// Days from `today` until expiration; negative once expired.
    pub fn days_until_expiration(&self, today: NaiveDate) -> Option<i64> {
        self.expiration()
            .map(|expires| expires.signed_duration_since(today).num_days())
    }
}

/// Free-function form of [`LicenseResult::is_life_licensed`].
pub fn is_life_licensed(result: &LicenseResult) -> bool {
    result.is_life_licensed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(license_type: &str) -> LicenseResult {
        LicenseResult {
            found: true,
            active: true,
            license_type: license_type.into(),
            ..Default::default()
        }
    }

    #[test]
    fn life_accident_and_health_is_life_licensed() {
        assert!(is_life_licensed(&active("Life, Accident and Health")));
    }

    #[test]
    fn property_is_not_life_licensed() {
        assert!(!is_life_licensed(&active("Property")));
    }

    #[test]
    fn inactive_life_is_not_life_licensed() {
        let mut result = active("Life");
        result.active = false;
        assert!(!result.is_life_licensed());
    }

    #[test]
    fn life_in_loas_counts() {
        let mut result = active("Insurance Producer - Active");
        result.loas = "Accident & Health\nLIFE".into();
        assert!(result.is_life_licensed());
    }

    #[test]
    fn parses_us_and_iso_expiration_dates() {
        let mut result = LicenseResult::default();
        result.expiration_date = "03/31/2027".into();
        assert_eq!(result.expiration(), NaiveDate::from_ymd_opt(2027, 3, 31));

        result.expiration_date = "2027-03-31T00:00:00".into();
        assert_eq!(result.expiration(), NaiveDate::from_ymd_opt(2027, 3, 31));

        result.expiration_date = "soon".into();
        assert_eq!(result.expiration(), None);
    }

    #[test]
    fn counts_days_until_expiration() {
        let result = LicenseResult {
            expiration_date: "2026-11-01".into(),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(result.days_until_expiration(today), Some(13));
    }

    #[test]
    fn deserializes_partial_records() {
        let parsed: LicenseResult =
            serde_json::from_str(r#"{"found":true,"npn":"123","state":"AL"}"#).unwrap();
        assert!(parsed.found);
        assert_eq!(parsed.npn, "123");
        assert!(parsed.full_name.is_empty());
    }
}
