//! NAIC and Florida adapters against local mock servers.

mod common;

use doi_scraper_rs::{LookupContext, LookupError, Registry, Scraper};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{browser_sessions, mock_endpoints};

fn registry(server: &MockServer) -> Registry {
    Registry::with_endpoints(browser_sessions(), None, mock_endpoints(server))
}

#[tokio::test]
async fn naic_name_lookup_maps_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/licenseLookup/search"))
        .and(query_param("jurisdiction", "WI"))
        .and(query_param("searchType", "Licensee"))
        .and(query_param("entityType", "IND"))
        .and(query_param("firstName", "Jane"))
        .and(query_param("lastName", "Doe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "name": "DOE, JANE A",
                "npn": "17001234",
                "licenseNumber": 4455,
                "licenseType": "Intermediary (Agent) Individual - Active",
                "licenseEffectiveDate": "03/01/2019",
                "licenseExpirationDate": "03/31/2027",
                "loas": "Life<br/>Accident &amp; Health",
                "residency": "Yes",
                "businessAddress": "1 Capitol Sq, Madison WI",
                "businessPhone": "608-555-0100"
            },
            {
                "name": "DOE, JANE B",
                "npn": "17005678",
                "licenseNumber": "W-99",
                "licenseType": "Intermediary (Agent) Individual - Inactive",
                "residency": "No"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = registry(&server).get_adapter("wi");
    let results = adapter
        .lookup_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("lookup");

    assert_eq!(results.len(), 2);
    let first = &results[0];
    assert!(first.found && first.active && first.resident);
    assert_eq!(first.npn, "17001234");
    assert_eq!(first.license_number, "4455");
    assert_eq!(first.state, "WI");
    assert_eq!(first.loas, "Life\nAccident & Health");
    assert!(first.is_life_licensed());
    assert_eq!(results[1].license_number, "W-99");
    assert!(!results[1].resident);
}

#[tokio::test]
async fn naic_npn_lookup_sends_npn() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/licenseLookup/search"))
        .and(query_param("npn", "17001234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let results = registry(&server)
        .get_adapter("AL")
        .lookup_by_npn(&LookupContext::background(), "17001234")
        .await
        .expect("lookup");
    assert_eq!(results.len(), 1);
    assert!(!results[0].found);
    assert_eq!(results[0].state, "AL");
}

#[tokio::test]
async fn naic_server_error_is_code_level_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = registry(&server)
        .get_adapter("IL")
        .lookup_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Status { status: 503, .. }));
    assert_eq!(err.state(), "IL");
}

const FL_RESULTS: &str = r#"<html><body>
<table class="table"><thead><tr><th>Name</th><th>License</th></tr></thead><tbody>
  <tr><td><a href="/Licensee/Details/42">DOE, JANE</a></td><td>W100200</td></tr>
</tbody></table></body></html>"#;

const FL_DETAIL: &str = r#"<html><body>
<div class="form-group"><label>NPN #:</label><span>8812345</span></div>
<div class="form-group"><label>Email:</label><span>jane@example.com</span></div>
<div class="form-group"><label>County:</label><span>Leon</span></div>
<div class="panel"><div class="panel-heading">Valid Licenses</div><table><tbody>
  <tr><td>Life Including Variable Annuity (2-14)</td><td>02/02/2021</td></tr>
</tbody></table></div>
<div class="panel"><div class="panel-heading">Appointments</div><table><tbody>
  <tr><td>ACME LIFE</td><td>02/02/2021</td><td>09/30/2027</td><td>02/02/2021</td></tr>
</tbody></table></div>
</body></html>"#;

#[tokio::test]
async fn florida_search_follows_detail_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("IndividualLNameFilter=Doe"))
        .and(body_string_contains("IndividualFNameFilter=Jane"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FL_RESULTS))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Licensee/Details/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FL_DETAIL))
        .expect(1)
        .mount(&server)
        .await;

    let results = registry(&server)
        .get_adapter("fl")
        .lookup_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("lookup");

    assert_eq!(results.len(), 1);
    let record = &results[0];
    assert!(record.found && record.active);
    assert_eq!(record.full_name, "DOE, JANE");
    assert_eq!(record.license_number, "W100200");
    assert_eq!(record.npn, "8812345");
    assert_eq!(record.status, "VALID");
    assert_eq!(record.expiration_date, "09/30/2027");
    assert_eq!(record.county, "Leon");
    assert!(record.is_life_licensed());
}

#[tokio::test]
async fn florida_http_failure_is_partial_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let results = registry(&server)
        .get_adapter("FL")
        .lookup_by_name(&LookupContext::background(), "Jane", "Doe")
        .await
        .expect("partial failure is not a code-level error");
    assert_eq!(results.len(), 1);
    assert!(!results[0].found);
    assert_eq!(results[0].error, "HTTP 500 on POST");
}

#[tokio::test]
async fn florida_no_results_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<p>No Licensee found for this search.</p>"),
        )
        .mount(&server)
        .await;

    let results = registry(&server)
        .get_adapter("FL")
        .lookup_by_license_number(&LookupContext::background(), "W000000")
        .await
        .expect("lookup");
    assert_eq!(results, vec![doi_scraper_rs::LicenseResult::not_found("FL")]);
}
