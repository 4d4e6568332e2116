//! Shared flow for DOI search forms sitting behind a Turnstile challenge.
//!
//! A gated search walks `Start -> ChallengeSolved -> FormPageFetched ->
//! ResultsSubmitted -> Parsed` on one session. Sites differ only in where the
//! challenge key comes from, which form fields they expect, and the layout of
//! their results table; [`GatedForm`] captures those differences.

use std::sync::Arc;

use scraper::Html;
use url::Url;

use super::html::{RowLayout, input_value, parse_result_rows};
use crate::core::error::excerpt;
use crate::core::{LicenseResult, LookupContext, LookupError, LookupResult};
use crate::external_deps::captcha::CaptchaProvider;
use crate::session::{BrowserProfile, HttpSession, SessionFactory};

/// Where the challenge site key is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SiteKeySource {
    /// Key is known up front, so the challenge is solved before the form page
    /// is fetched.
    Static(&'static str),
    /// Key is embedded in a hidden input of the form page. An empty value
    /// means the page did not present a challenge this time.
    PageField(&'static str),
}

/// Form description of one gated search page.
#[derive(Debug, Clone)]
pub(crate) struct GatedForm {
    pub state: &'static str,
    pub page_url: Url,
    pub manual_url: String,
    pub site_key: SiteKeySource,
    pub last_name_field: &'static str,
    pub first_name_field: &'static str,
    pub token_field: &'static str,
    pub csrf_field: Option<&'static str>,
    pub extra_fields: &'static [(&'static str, &'static str)],
    pub layout: RowLayout,
}

pub(crate) struct GatedFlow {
    form: GatedForm,
    sessions: Arc<dyn SessionFactory>,
    solver: Option<Arc<dyn CaptchaProvider>>,
    profile: BrowserProfile,
}

/// Output of the form-page step.
struct FormPage {
    site_key: Option<String>,
    csrf_token: String,
}

impl GatedFlow {
    pub fn new(
        form: GatedForm,
        sessions: Arc<dyn SessionFactory>,
        solver: Option<Arc<dyn CaptchaProvider>>,
    ) -> Self {
        Self {
            form,
            sessions,
            solver,
            profile: BrowserProfile::default(),
        }
    }

    pub fn state(&self) -> &'static str {
        self.form.state
    }

    pub fn page_url(&self) -> &Url {
        &self.form.page_url
    }

    pub fn manual_url(&self) -> &str {
        &self.form.manual_url
    }

    pub fn solver_configured(&self) -> bool {
        self.solver.is_some()
    }

    pub fn not_configured(&self) -> LicenseResult {
        LicenseResult::with_error(
            self.form.state,
            format!(
                "{} DOI requires CAPTCHA solving; solver not configured. Verify manually at {}",
                self.form.state, self.form.manual_url
            ),
        )
    }

    pub fn unsupported(&self, what: &str) -> LicenseResult {
        LicenseResult::with_error(
            self.form.state,
            format!(
                "{} DOI does not support {what}. Verify manually at {}",
                self.form.state, self.form.manual_url
            ),
        )
    }

    pub async fn search_by_name(
        &self,
        ctx: &LookupContext,
        first_name: &str,
        last_name: &str,
    ) -> LookupResult<Vec<LicenseResult>> {
        let state = self.form.state;
        let Some(solver) = self.solver.as_deref() else {
            log::debug!("{state}: solver not configured, skipping network flow");
            return Ok(vec![self.not_configured()]);
        };

        log::debug!("{state} lookup: {first_name} {last_name}");
        let session = self
            .sessions
            .new_session()
            .map_err(|source| LookupError::Session {
                state: state.to_string(),
                source,
            })?;

        let (token, page) = match self.form.site_key {
            SiteKeySource::Static(site_key) => {
                let token = self.solve(ctx, solver, site_key).await?;
                let page = self.fetch_form_page(ctx, session.as_ref()).await?;
                (token, page)
            }
            SiteKeySource::PageField(_) => {
                let page = self.fetch_form_page(ctx, session.as_ref()).await?;
                let token = match page.site_key.as_deref() {
                    Some(site_key) => self.solve(ctx, solver, site_key).await?,
                    None => {
                        log::debug!("{state}: form page presented no challenge key");
                        String::new()
                    }
                };
                (token, page)
            }
        };

        let body = self
            .submit(ctx, session.as_ref(), first_name, last_name, &token, &page.csrf_token)
            .await?;

        let results = parse_result_rows(&body, self.form.layout, state);
        if results.is_empty() {
            return Ok(vec![LicenseResult::not_found(state)]);
        }
        log::info!("{state}: found {} results", results.len());
        Ok(results)
    }

    async fn solve(
        &self,
        ctx: &LookupContext,
        solver: &dyn CaptchaProvider,
        site_key: &str,
    ) -> LookupResult<String> {
        log::debug!("{}: solving challenge via {}", self.form.state, solver.name());
        solver
            .solve_challenge(ctx, &self.form.page_url, site_key)
            .await
            .map_err(|source| LookupError::Challenge {
                state: self.form.state.to_string(),
                source,
            })
    }

    async fn fetch_form_page(
        &self,
        ctx: &LookupContext,
        session: &dyn HttpSession,
    ) -> LookupResult<FormPage> {
        let state = self.form.state;
        let headers = self
            .profile
            .navigation_headers(None)
            .map_err(|source| LookupError::Session {
                state: state.to_string(),
                source,
            })?;

        let response = ctx
            .run(session.get(&self.form.page_url, &headers))
            .await
            .map_err(|source| LookupError::interrupted(state, source))?
            .map_err(|source| LookupError::transport(state, "form page", source))?;

        let body = response.text();
        if !response.is_success() {
            return Err(LookupError::Status {
                state: state.to_string(),
                step: "form page",
                status: response.status,
                excerpt: excerpt(&body),
            });
        }

        let document = Html::parse_document(&body);
        let csrf_token = self
            .form
            .csrf_field
            .and_then(|field| input_value(&document, field))
            .unwrap_or_default();
        let site_key = match self.form.site_key {
            SiteKeySource::PageField(field) => {
                input_value(&document, field).filter(|key| !key.trim().is_empty())
            }
            SiteKeySource::Static(_) => None,
        };

        Ok(FormPage {
            site_key,
            csrf_token,
        })
    }

    async fn submit(
        &self,
        ctx: &LookupContext,
        session: &dyn HttpSession,
        first_name: &str,
        last_name: &str,
        token: &str,
        csrf_token: &str,
    ) -> LookupResult<String> {
        let state = self.form.state;
        let form = self.form_fields(first_name, last_name, token, csrf_token);
        let origin = self.form.page_url.origin().ascii_serialization();
        let headers = self
            .profile
            .form_headers(self.form.page_url.as_str(), &origin)
            .map_err(|source| LookupError::Session {
                state: state.to_string(),
                source,
            })?;

        let response = ctx
            .run(session.post_form(&self.form.page_url, &headers, &form))
            .await
            .map_err(|source| LookupError::interrupted(state, source))?
            .map_err(|source| LookupError::transport(state, "search post", source))?;

        let body = response.text();
        if !response.is_success() {
            return Err(LookupError::Status {
                state: state.to_string(),
                step: "search post",
                status: response.status,
                excerpt: excerpt(&body),
            });
        }
        Ok(body)
    }

    fn form_fields(
        &self,
        first_name: &str,
        last_name: &str,
        token: &str,
        csrf_token: &str,
    ) -> Vec<(String, String)> {
        let mut form = vec![
            (self.form.last_name_field.to_string(), last_name.trim().to_string()),
            (self.form.first_name_field.to_string(), first_name.trim().to_string()),
            (self.form.token_field.to_string(), token.to_string()),
        ];
        if let Some(field) = self.form.csrf_field {
            form.push((field.to_string(), csrf_token.to_string()));
        }
        form.extend(
            self.form
                .extra_fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(site_key: SiteKeySource) -> GatedForm {
        GatedForm {
            state: "ZZ",
            page_url: Url::parse("https://doi.example.gov/search").unwrap(),
            manual_url: "https://doi.example.gov/".into(),
            site_key,
            last_name_field: "last",
            first_name_field: "first",
            token_field: "token",
            csrf_field: Some("csrf"),
            extra_fields: &[("search", "Search")],
            layout: RowLayout {
                min_cells: 2,
                name: 0,
                license_number: 1,
                license_type: None,
                status: Some(2),
            },
        }
    }

    fn unreachable_sessions() -> Arc<dyn SessionFactory> {
        Arc::new(|| -> crate::session::SessionResult<Box<dyn HttpSession>> {
            panic!("no session should be created")
        })
    }

    #[tokio::test]
    async fn missing_solver_short_circuits() {
        let flow = GatedFlow::new(form(SiteKeySource::Static("0xKEY")), unreachable_sessions(), None);
        let results = flow
            .search_by_name(&LookupContext::background(), "Jane", "Doe")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].found);
        assert!(results[0].error.contains("not configured"));
        assert!(results[0].error.contains("https://doi.example.gov/"));
    }

    #[test]
    fn form_fields_include_tokens_and_extras() {
        let flow = GatedFlow::new(form(SiteKeySource::PageField("key")), unreachable_sessions(), None);
        let fields = flow.form_fields(" Jane ", "Doe", "tok", "csrf-1");
        assert_eq!(
            fields,
            vec![
                ("last".to_string(), "Doe".to_string()),
                ("first".to_string(), "Jane".to_string()),
                ("token".to_string(), "tok".to_string()),
                ("csrf".to_string(), "csrf-1".to_string()),
                ("search".to_string(), "Search".to_string()),
            ]
        );
    }
}
