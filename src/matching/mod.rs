//! Best-match selection over one adapter call's results.

use thiserror::Error;

use crate::core::LicenseResult;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// A record reported that the lookup itself could not be completed.
    #[error("{0}")]
    Lookup(String),
    #[error("no active license found for {name} in {state}")]
    NoActiveLicense { name: String, state: String },
}

/// Picks the best record for the queried person.
///
/// Active life-licensed records win over any other active record; inactive
/// records are never selected. Ties go to the earliest record.
#[derive(Debug, Clone)]
pub struct MatchSelector {
    first_name: String,
    last_name: String,
    state: String,
}

impl MatchSelector {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            state: state.into(),
        }
    }

    pub fn select_best<'a>(&self, results: &'a [LicenseResult]) -> Result<&'a LicenseResult, SelectError> {
        if let Some(best) = results
            .iter()
            .find(|r| r.found && r.active && r.is_life_licensed())
        {
            return Ok(best);
        }
        if let Some(active) = results.iter().find(|r| r.found && r.active) {
            return Ok(active);
        }

        if let Some(failed) = results.iter().find(|r| r.has_error()) {
            return Err(SelectError::Lookup(failed.error.clone()));
        }
        Err(SelectError::NoActiveLicense {
            name: format!("{} {}", self.first_name.trim(), self.last_name.trim()),
            state: self.state.clone(),
        })
    }
}
