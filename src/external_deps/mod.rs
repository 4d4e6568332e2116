//! Integrations that rely on third-party services.
//!
//! Currently this is the captcha solving gateway used by adapters whose DOI
//! site gates its search form behind a challenge.

pub mod captcha;
