use couchbase_analytics_core::httpx::request::{Auth, BasicAuth};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// How the client authenticates to the analytics service.
///
/// Credentials may be rotated on a live cluster, but only within the same
/// kind: the TLS key material backing a certificate credential cannot be
/// reconfigured on an active connection pool.
#[derive(Clone)]
pub struct Credential {
    inner: Arc<CredentialInner>,
}

enum CredentialInner {
    Basic {
        username: String,
        password: String,
    },
    Certificate {
        cert_chain_pem: String,
        private_key_pem: String,
    },
    Dynamic(Box<dyn Fn() -> Credential + Send + Sync>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CredentialKind {
    Basic,
    Certificate,
    Dynamic,
}

impl Credential {
    /// Username and password, sent as HTTP Basic authentication.
    pub fn of(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CredentialInner::Basic {
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    /// Mutual TLS. The certificate chain and private key are installed into
    /// the TLS configuration at cluster construction; no Authorization
    /// header is sent.
    pub fn of_certificate(
        cert_chain_pem: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(CredentialInner::Certificate {
                cert_chain_pem: cert_chain_pem.into(),
                private_key_pem: private_key_pem.into(),
            }),
        }
    }

    /// Defers to `supplier` each time a request needs credentials.
    pub fn of_dynamic(supplier: impl Fn() -> Credential + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(CredentialInner::Dynamic(Box::new(supplier))),
        }
    }

    pub fn kind(&self) -> CredentialKind {
        match &*self.inner {
            CredentialInner::Basic { .. } => CredentialKind::Basic,
            CredentialInner::Certificate { .. } => CredentialKind::Certificate,
            CredentialInner::Dynamic(_) => CredentialKind::Dynamic,
        }
    }

    pub(crate) fn resolve_auth(&self) -> Auth {
        match &*self.inner {
            CredentialInner::Basic { username, password } => {
                Auth::BasicAuth(BasicAuth::new(username.clone(), password.clone()))
            }
            CredentialInner::Certificate { .. } => Auth::ClientCertificate,
            CredentialInner::Dynamic(supplier) => supplier().resolve_auth(),
        }
    }

    pub(crate) fn client_identity_pem(&self) -> Option<(String, String)> {
        match &*self.inner {
            CredentialInner::Basic { .. } => None,
            CredentialInner::Certificate {
                cert_chain_pem,
                private_key_pem,
            } => Some((cert_chain_pem.clone(), private_key_pem.clone())),
            CredentialInner::Dynamic(supplier) => supplier().client_identity_pem(),
        }
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credential_resolves_to_basic_auth() {
        let credential = Credential::of("user", "pass");
        assert_eq!(credential.kind(), CredentialKind::Basic);
        assert_eq!(
            credential.resolve_auth(),
            Auth::BasicAuth(BasicAuth::new("user", "pass"))
        );
        assert!(credential.client_identity_pem().is_none());
    }

    #[test]
    fn dynamic_credential_defers_to_the_supplier() {
        let credential = Credential::of_dynamic(|| Credential::of("rotated", "secret"));
        assert_eq!(credential.kind(), CredentialKind::Dynamic);
        assert_eq!(
            credential.resolve_auth(),
            Auth::BasicAuth(BasicAuth::new("rotated", "secret"))
        );
    }

    #[test]
    fn certificate_credential_carries_no_authorization_header() {
        let credential = Credential::of_certificate("CERT PEM", "KEY PEM");
        assert_eq!(credential.resolve_auth(), Auth::ClientCertificate);
        assert_eq!(
            credential.client_identity_pem(),
            Some(("CERT PEM".to_string(), "KEY PEM".to_string()))
        );
    }
}
