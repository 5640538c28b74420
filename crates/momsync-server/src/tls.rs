//! PEM loading and the mutual-TLS server configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use momsync_core::config::ListenerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

pub fn parse_certificates(pem: &[u8]) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse certificates")?;
    if certs.is_empty() {
        bail!("no certificates found");
    }
    Ok(certs)
}

pub fn parse_private_key(pem: &[u8]) -> anyhow::Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem).context("failed to parse private key")
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}

/// Build the listener's TLS configuration from in-memory PEM data.
///
/// Client certificates must chain to a CA in `client_ca_pem`. With
/// `require_client_cert` off, clients without a certificate are let through
/// but a presented certificate is still verified.
pub fn server_config_from_pem(
    cert_pem: &[u8],
    key_pem: &[u8],
    client_ca_pem: &[u8],
    require_client_cert: bool,
) -> anyhow::Result<Arc<ServerConfig>> {
    let certs = parse_certificates(cert_pem).context("server certificate")?;
    let key = parse_private_key(key_pem).context("server key")?;

    let mut roots = RootCertStore::empty();
    for ca in parse_certificates(client_ca_pem).context("client CA bundle")? {
        roots.add(ca).context("failed to add client CA certificate")?;
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone());
    let verifier = if require_client_cert {
        verifier
    } else {
        verifier.allow_unauthenticated()
    }
    .build()
    .context("client verifier error")?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("TLS protocol versions")?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .context("server config error")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

pub fn server_config(listener: &ListenerConfig) -> anyhow::Result<Arc<ServerConfig>> {
    server_config_from_pem(
        &read(&listener.server_cert)?,
        &read(&listener.server_key)?,
        &read(&listener.client_ca)?,
        listener.require_client_cert,
    )
}
