use crate::credential::Credential;
use crate::error::{Error, Result};
use couchbase_analytics_core::insecure_certverifier::InsecureCertVerifier;
use couchbase_analytics_core::tls_config::TlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;
use std::path::PathBuf;
use std::sync::Arc;

/// How server certificates are verified. Exactly one source is in effect;
/// the default trusts the platform certificate store.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct SecurityOptions {
    pub(crate) trust_source: Option<TrustSource>,
    pub(crate) disable_server_certificate_verification: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum TrustSource {
    PemString(String),
    PemFile(PathBuf),
    Platform,
}

impl SecurityOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn trust_only_pem_string(mut self, pem_encoded_certificates: impl Into<String>) -> Self {
        self.trust_source = Some(TrustSource::PemString(pem_encoded_certificates.into()));
        self
    }

    pub fn trust_only_pem_file(mut self, pem_file: impl Into<PathBuf>) -> Self {
        self.trust_source = Some(TrustSource::PemFile(pem_file.into()));
        self
    }

    /// Trust the certificates from the platform's native certificate store.
    pub fn trust_only_platform(mut self) -> Self {
        self.trust_source = Some(TrustSource::Platform);
        self
    }

    /// Disables server certificate verification entirely. Testing only.
    pub fn disable_server_certificate_verification(mut self, disable: bool) -> Self {
        self.disable_server_certificate_verification = disable;
        self
    }
}

/// Builds the TLS configuration: protocol pinned to TLS 1.3 (which limits
/// cipher suites to the AEAD suites the analytics service supports), roots
/// from the selected trust source, and the credential's key material when
/// mutual TLS is in use.
pub(crate) fn build_tls_config(
    security: &SecurityOptions,
    credential: &Credential,
) -> Result<TlsConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| {
            Error::new_invalid_argument_error(
                format!("failed to configure TLS 1.3: {e}"),
                None::<String>,
            )
        })?;

    let builder = if security.disable_server_certificate_verification {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier::new()))
    } else {
        let mut roots = RootCertStore::empty();
        match security.trust_source.as_ref().unwrap_or(&TrustSource::Platform) {
            TrustSource::PemString(pem) => {
                add_pem_certificates(&mut roots, pem.as_bytes(), "<pem string>")?
            }
            TrustSource::PemFile(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    Error::new_invalid_argument_error(
                        format!("failed to read PEM file {}: {e}", path.display()),
                        "trust_only_pem_file".to_string(),
                    )
                })?;
                add_pem_certificates(&mut roots, &pem, &path.display().to_string())?
            }
            TrustSource::Platform => {
                let native = rustls_native_certs::load_native_certs();
                let (_added, _ignored) = roots.add_parsable_certificates(native.certs);
                if roots.is_empty() {
                    return Err(Error::new_invalid_argument_error(
                        "the platform certificate store contained no usable CA certificates",
                        "trust_only_platform".to_string(),
                    ));
                }
            }
        }
        builder.with_root_certificates(roots)
    };

    let config = match credential.client_identity_pem() {
        Some((cert_chain_pem, private_key_pem)) => {
            let certs = parse_pem_certificates(cert_chain_pem.as_bytes(), "<client certificate>")?;
            let key = parse_pem_private_key(private_key_pem.as_bytes())?;
            builder.with_client_auth_cert(certs, key).map_err(|e| {
                Error::new_invalid_argument_error(
                    format!("client certificate rejected: {e}"),
                    "credential".to_string(),
                )
            })?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

fn add_pem_certificates(roots: &mut RootCertStore, pem: &[u8], source: &str) -> Result<()> {
    for cert in parse_pem_certificates(pem, source)? {
        roots.add(cert).map_err(|e| {
            Error::new_invalid_argument_error(
                format!("rejected CA certificate from {source}: {e}"),
                "certificates".to_string(),
            )
        })?;
    }
    Ok(())
}

fn parse_pem_certificates(pem: &[u8], source: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| {
            Error::new_invalid_argument_error(
                format!("failed to parse PEM from {source}: {e}"),
                "certificates".to_string(),
            )
        })?;
    if certs.is_empty() {
        return Err(Error::new_invalid_argument_error(
            format!("{source} contained no certificates"),
            "certificates".to_string(),
        ));
    }
    Ok(certs)
}

fn parse_pem_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| {
            Error::new_invalid_argument_error(
                format!("failed to parse private key PEM: {e}"),
                "credential".to_string(),
            )
        })?
        .ok_or_else(|| {
            Error::new_invalid_argument_error(
                "private key PEM contained no key",
                "credential".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::NON_PROD_CERTIFICATES_PEM;

    #[test]
    fn non_prod_bundle_parses() {
        let certs =
            parse_pem_certificates(NON_PROD_CERTIFICATES_PEM.as_bytes(), "<non-prod>").unwrap();
        assert_eq!(certs.len(), 1);
    }

    #[test]
    fn empty_pem_is_rejected() {
        assert!(parse_pem_certificates(b"", "<empty>").is_err());
    }

    #[test]
    fn pem_string_trust_source_builds_a_config() {
        let security = SecurityOptions::new().trust_only_pem_string(NON_PROD_CERTIFICATES_PEM);
        let credential = Credential::of("user", "pass");
        build_tls_config(&security, &credential).unwrap();
    }

    #[test]
    fn insecure_mode_builds_a_config() {
        let security = SecurityOptions::new().disable_server_certificate_verification(true);
        let credential = Credential::of("user", "pass");
        build_tls_config(&security, &credential).unwrap();
    }
}
