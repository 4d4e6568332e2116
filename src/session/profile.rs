//! The browser profile every session presents.
//!
//! One desktop Chrome profile is used for every request. Sites that pin a
//! fingerprint to the session reject follow-up requests whose handshake or
//! headers change, so there is no rotation here.
//!
//! The handshake is described by the profile's JA3 string; [`super::tls`]
//! turns it into the client TLS configuration.

use std::str::FromStr;

use http::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER,
    USER_AGENT,
};

use super::{SessionError, SessionResult};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json, text/plain, */*";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub name: &'static str,
    /// `version,ciphers,extensions,groups,point_formats` as captured from
    /// the browser, GREASE values removed.
    pub ja3: String,
    pub alpn_protocols: Vec<String>,
    pub user_agent: String,
    pub accept_language: String,
    /// Client-hint headers Chrome sends on every navigation.
    pub client_hints: Vec<(&'static str, String)>,
}

/// Chrome 124 on Windows 10.
pub fn chrome_desktop_profile() -> BrowserProfile {
    BrowserProfile {
        name: "chrome_124",
        ja3: "771,4865-4866-4867-49195-49199-49196-49200-52393-52392-49171-49172-156-157-47-53,0-23-65281-10-11-35-16-5-13-18-51-45-43-27-17513,29-23-24,0".into(),
        alpn_protocols: vec!["h2".into(), "http/1.1".into()],
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".into(),
        accept_language: "en-US,en;q=0.9".into(),
        client_hints: vec![
            (
                "sec-ch-ua",
                r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#.into(),
            ),
            ("sec-ch-ua-mobile", "?0".into()),
            ("sec-ch-ua-platform", r#""Windows""#.into()),
        ],
    }
}

impl Default for BrowserProfile {
    fn default() -> Self {
        chrome_desktop_profile()
    }
}

impl BrowserProfile {
    pub fn handshake(&self) -> SessionResult<Ja3> {
        self.ja3.parse()
    }

    /// Headers attached to every request of a session.
    pub fn base_headers(&self) -> SessionResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user-agent", &self.user_agent)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value("accept-language", &self.accept_language)?,
        );
        for (name, value) in &self.client_hints {
            headers.insert(HeaderName::from_static(*name), header_value(name, value)?);
        }
        Ok(headers)
    }

    /// Top-level HTML page load.
    pub fn navigation_headers(&self, referer: Option<&str>) -> SessionResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
        if let Some(referer) = referer {
            headers.insert(REFERER, header_value("referer", referer)?);
        }
        Ok(headers)
    }

    /// Url-encoded form submission from a page on `origin`.
    pub fn form_headers(&self, referer: &str, origin: &str) -> SessionResult<HeaderMap> {
        let mut headers = self.navigation_headers(Some(referer))?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        headers.insert(ORIGIN, header_value("origin", origin)?);
        Ok(headers)
    }

    /// XHR-style JSON API call issued by a page on `origin`.
    pub fn json_headers(&self, origin: &str, referer: &str) -> SessionResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));
        headers.insert(ORIGIN, header_value("origin", origin)?);
        headers.insert(REFERER, header_value("referer", referer)?);
        Ok(headers)
    }
}

/// Parsed JA3 ClientHello description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja3 {
    pub version: u16,
    pub ciphers: Vec<u16>,
    pub extensions: Vec<u16>,
    pub groups: Vec<u16>,
    pub point_formats: Vec<u8>,
}

impl FromStr for Ja3 {
    type Err = SessionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = raw.trim().split(',').collect();
        let &[version, ciphers, extensions, groups, point_formats] = fields.as_slice() else {
            return Err(SessionError::Fingerprint(format!(
                "expected 5 ja3 fields, got {}",
                fields.len()
            )));
        };

        Ok(Self {
            version: version
                .parse()
                .map_err(|_| SessionError::Fingerprint(format!("bad ja3 version '{version}'")))?,
            ciphers: ja3_list(ciphers)?,
            extensions: ja3_list(extensions)?,
            groups: ja3_list(groups)?,
            point_formats: ja3_list(point_formats)?,
        })
    }
}

fn ja3_list<T: FromStr>(field: &str) -> SessionResult<Vec<T>> {
    if field.is_empty() {
        return Ok(Vec::new());
    }
    field
        .split('-')
        .map(|value| {
            value
                .parse()
                .map_err(|_| SessionError::Fingerprint(format!("bad ja3 value '{value}'")))
        })
        .collect()
}

fn header_value(name: &str, value: &str) -> SessionResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| SessionError::InvalidHeader(name.to_string()))
}
