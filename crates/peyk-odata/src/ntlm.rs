//! NTLM message generation for the per-request handshake.
//!
//! The remote endpoint offers no session support, so every request runs
//! the full negotiate / challenge / authenticate exchange. This module
//! only produces and consumes the `Authorization` / `WWW-Authenticate`
//! header tokens; the HTTP legs live in [`crate::client`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sspi::builders::EmptyInitializeSecurityContext;
use sspi::{
    AuthIdentity, ClientRequestFlags, CredentialUse, DataRepresentation, Ntlm, SecurityBuffer,
    SecurityBufferType, Sspi, SspiImpl,
};

use crate::credentials::CredentialContext;
use crate::error::{OdataError, OdataResult};

/// Header scheme prefix for NTLM tokens.
const SCHEME: &str = "NTLM";

/// One in-flight NTLM exchange.
pub(crate) struct NtlmHandshake {
    ntlm: Ntlm,
    credentials_handle: <Ntlm as SspiImpl>::CredentialsHandle,
    target: String,
}

impl NtlmHandshake {
    /// Prepares a handshake for the given credentials and SPN target.
    pub(crate) fn new(credentials: &CredentialContext, target: &str) -> OdataResult<Self> {
        let identity = AuthIdentity {
            username: credentials.username.clone(),
            password: credentials.password().to_string().into(),
            domain: Some(credentials.domain.clone()),
        };

        let mut ntlm = Ntlm::new();
        let acquired = ntlm
            .acquire_credentials_handle()
            .with_credential_use(CredentialUse::Outbound)
            .with_auth_data(&identity)
            .execute()
            .map_err(|e| OdataError::Ntlm(e.to_string()))?;

        Ok(Self {
            ntlm,
            credentials_handle: acquired.credentials_handle,
            target: target.to_string(),
        })
    }

    /// First-leg `Authorization` header value (type 1 message).
    pub(crate) fn negotiate(&mut self) -> OdataResult<String> {
        self.step(&[])
    }

    /// Final `Authorization` header value (type 3 message) built from the
    /// server's `WWW-Authenticate: NTLM <challenge>` header.
    pub(crate) fn authenticate(&mut self, challenge_header: &str) -> OdataResult<String> {
        let token = challenge_header
            .trim()
            .strip_prefix(SCHEME)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OdataError::Ntlm("missing NTLM challenge token".into()))?;
        let challenge = BASE64
            .decode(token)
            .map_err(|e| OdataError::Ntlm(format!("malformed NTLM challenge: {e}")))?;
        self.step(&challenge)
    }

    fn step(&mut self, input: &[u8]) -> OdataResult<String> {
        let mut input_buffers = vec![SecurityBuffer::new(
            input.to_vec(),
            SecurityBufferType::Token,
        )];
        let mut output_buffers =
            vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];

        let mut builder = EmptyInitializeSecurityContext::<<Ntlm as SspiImpl>::CredentialsHandle>::new()
            .with_credentials_handle(&mut self.credentials_handle)
            .with_context_requirements(
                ClientRequestFlags::CONFIDENTIALITY | ClientRequestFlags::ALLOCATE_MEMORY,
            )
            .with_target_data_representation(DataRepresentation::Native)
            .with_target_name(&self.target)
            .with_output(&mut output_buffers);
        if !input.is_empty() {
            builder = builder.with_input(&mut input_buffers);
        }

        self.ntlm
            .initialize_security_context_impl(&mut builder)
            .map_err(|e| OdataError::Ntlm(e.to_string()))?;

        let token = output_buffers.remove(0).buffer;
        Ok(format!("{SCHEME} {}", BASE64.encode(token)))
    }
}

/// Extracts the NTLM challenge from a `WWW-Authenticate` header list.
pub(crate) fn find_challenge<'a, I>(headers: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    headers
        .into_iter()
        .map(str::trim)
        .find(|h| h.len() > SCHEME.len() && h.starts_with(SCHEME))
}
