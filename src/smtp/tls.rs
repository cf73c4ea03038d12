use std::sync::Arc;

use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::Error;

/// Client connector trusting the platform certificate store.
pub(crate) fn native_connector() -> Result<TlsConnector, Error> {
    let certs = rustls_native_certs::load_native_certs().map_err(|source| Error::Tls { source })?;
    let ders: Vec<Vec<u8>> = certs.into_iter().map(|cert| cert.0).collect();

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(&ders);
    debug!(target: "mailprobe::smtp", added, ignored, "loaded native root certificates");

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}
