//! TLS client configuration for the target connection.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

/// Errors building the TLS client configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("cannot read CA file {path}: {source}")]
    CaFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CA file {0} holds no certificates")]
    NoCertificates(String),
    #[error("rustls rejected the configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Build a connector trusting the web PKI roots plus an optional PEM bundle.
pub fn build_connector(ca_file: Option<&Path>) -> Result<TlsConnector, TlsConfigError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_file {
        let added = add_pem_roots(&mut roots, path)?;
        tracing::info!(path = %path.display(), added, "Extra CA certificates loaded");
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

fn add_pem_roots(roots: &mut RootCertStore, path: &Path) -> Result<usize, TlsConfigError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| TlsConfigError::CaFile {
        path: display.clone(),
        source,
    })?;

    let mut added = 0;
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        let cert = cert.map_err(|source| TlsConfigError::CaFile {
            path: display.clone(),
            source,
        })?;
        roots.add(cert)?;
        added += 1;
    }

    if added == 0 {
        return Err(TlsConfigError::NoCertificates(display));
    }
    Ok(added)
}
