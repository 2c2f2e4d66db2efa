//! Per-request credential context.
//!
//! The remote endpoint has no session support; every call authenticates
//! with a `{domain, username, password}` triple supplied by an external
//! credential store. The triple is request-scoped and never persisted
//! or logged by this crate.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{OdataError, OdataResult};

/// NTLM credential triple for one request.
#[derive(Clone)]
pub struct CredentialContext {
    /// NT domain, e.g. `CORP`.
    pub domain: String,
    /// Account name without the domain qualifier.
    pub username: String,
    /// Plaintext password, already decrypted by the caller's store.
    password: SecretString,
}

impl CredentialContext {
    /// Creates a credential context from its three parts.
    pub fn new(
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Creates a credential context from a `DOMAIN\user` qualified name.
    pub fn from_qualified(qualified: &str, password: impl Into<String>) -> OdataResult<Self> {
        let (domain, username) = qualified.split_once('\\').ok_or_else(|| {
            OdataError::Credentials("username must be in the form DOMAIN\\user".into())
        })?;
        if domain.is_empty() || username.is_empty() {
            return Err(OdataError::Credentials(
                "username must be in the form DOMAIN\\user".into(),
            ));
        }
        Ok(Self::new(domain, username, password))
    }

    /// Plaintext password for the NTLM handshake.
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialContext")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
