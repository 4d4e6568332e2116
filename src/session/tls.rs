//! Client TLS configuration derived from a browser profile.
//!
//! The JA3 string decides protocol versions, cipher-suite order and
//! key-exchange group order. Its extension list switches SNI, ALPN and
//! session tickets on or off. rustls keeps its own extension order and does
//! not emit GREASE values, and suites it does not implement (CBC, plain RSA)
//! are left out of the ClientHello.

use std::sync::Arc;

use rustls::client::{Resumption, Tls12Resumption};
use rustls::crypto::{CryptoProvider, SupportedKxGroup, ring};
use rustls::version::{TLS12, TLS13};
use rustls::{ClientConfig, RootCertStore, SupportedCipherSuite, SupportedProtocolVersion};

use super::{BrowserProfile, SessionError, SessionResult};

const TLS12_WIRE_VERSION: u16 = 0x0303;

const EXT_SERVER_NAME: u16 = 0;
const EXT_ALPN: u16 = 16;
const EXT_SESSION_TICKET: u16 = 35;
const EXT_SUPPORTED_VERSIONS: u16 = 43;

/// Build the rustls configuration every session of `profile` shares.
pub fn client_config(profile: &BrowserProfile) -> SessionResult<ClientConfig> {
    let ja3 = profile.handshake()?;
    if ja3.version < TLS12_WIRE_VERSION {
        return Err(SessionError::Fingerprint(format!(
            "{} offers TLS version {:#06x}, below 1.2",
            profile.name, ja3.version
        )));
    }

    let base = ring::default_provider();
    let cipher_suites = ordered_cipher_suites(&base.cipher_suites, &ja3.ciphers);
    if cipher_suites.is_empty() {
        return Err(SessionError::Fingerprint(format!(
            "{} offers no cipher suite rustls implements",
            profile.name
        )));
    }
    let kx_groups = ordered_kx_groups(&base.kx_groups, &ja3.groups);
    if kx_groups.is_empty() {
        return Err(SessionError::Fingerprint(format!(
            "{} offers no key-exchange group rustls implements",
            profile.name
        )));
    }
    let skipped = ja3.ciphers.len() - cipher_suites.len();
    if skipped > 0 {
        log::debug!("{}: {skipped} cipher suites not offered", profile.name);
    }

    let provider = CryptoProvider {
        cipher_suites,
        kx_groups,
        ..base
    };

    let versions: &[&'static SupportedProtocolVersion] =
        if ja3.extensions.contains(&EXT_SUPPORTED_VERSIONS) {
            &[&TLS13, &TLS12]
        } else {
            &[&TLS12]
        };

    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let mut config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(versions)
        .map_err(|err| SessionError::Fingerprint(err.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    config.enable_sni = ja3.extensions.contains(&EXT_SERVER_NAME);
    if ja3.extensions.contains(&EXT_ALPN) {
        config.alpn_protocols = profile
            .alpn_protocols
            .iter()
            .map(|protocol| protocol.as_bytes().to_vec())
            .collect();
    }
    if !ja3.extensions.contains(&EXT_SESSION_TICKET) {
        config.resumption = Resumption::default().tls12_resumption(Tls12Resumption::SessionIdOnly);
    }

    Ok(config)
}

fn ordered_cipher_suites(
    available: &[SupportedCipherSuite],
    wanted: &[u16],
) -> Vec<SupportedCipherSuite> {
    wanted
        .iter()
        .filter_map(|id| {
            available
                .iter()
                .find(|suite| u16::from(suite.suite()) == *id)
                .copied()
        })
        .collect()
}

fn ordered_kx_groups(
    available: &[&'static dyn SupportedKxGroup],
    wanted: &[u16],
) -> Vec<&'static dyn SupportedKxGroup> {
    wanted
        .iter()
        .filter_map(|id| {
            available
                .iter()
                .find(|group| u16::from(group.name()) == *id)
                .copied()
        })
        .collect()
}
