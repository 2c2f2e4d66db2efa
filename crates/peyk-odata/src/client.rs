//! Authenticated OData transport.
//!
//! One call is one authenticated round trip: a fresh NTLM handshake on a
//! fresh connection every time, no session reuse and no retries.
//! Success contracts are GET⇒200, POST⇒201|204, PATCH⇒204; anything
//! else surfaces the upstream status and raw body unmodified.

use std::time::Duration;

use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::credentials::CredentialContext;
use crate::error::{OdataError, OdataResult};
use crate::ntlm::{find_challenge, NtlmHandshake};
use crate::query::Query;

/// Wrapper for paginated list responses.
#[derive(Debug, Deserialize)]
pub struct ODataPage<T> {
    /// Records on this page.
    pub value: Vec<T>,
    /// Opaque continuation cursor, when more pages exist.
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Outcome of a create request.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// Upstream status, 201 or 204.
    pub status: u16,
    /// Record id recovered from the identity headers, when present.
    pub record_id: Option<Uuid>,
}

/// Pulls the record id out of an identity header such as
/// `http://…/tasks(9f8e0d7c-…)`.
#[must_use]
pub fn parse_record_id(header: &str) -> Option<Uuid> {
    let start = header.find('(')? + 1;
    let end = header[start..].find(')')? + start;
    Uuid::parse_str(header[start..end].trim_matches(['{', '}'])).ok()
}

/// NTLM-authenticated OData client for one remote endpoint.
#[derive(Debug, Clone)]
pub struct OdataClient {
    base_url: String,
    timeout: Duration,
}

impl OdataClient {
    /// Creates a client for the given service root, e.g.
    /// `http://crm.local/org/api/data/v9.1`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Service root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches an entity set or single record and deserializes the body.
    #[instrument(skip(self, query, credentials), fields(entity = entity))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &Query,
        credentials: &CredentialContext,
    ) -> OdataResult<T> {
        let url = query.target(&self.base_url, entity);
        debug!(url = %url, "GET");
        let response = self
            .send(Method::GET, &url, None, &query.request_headers(), credentials)
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(OdataError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| OdataError::RemoteServer {
            status: status.as_u16(),
            body,
        })
    }

    /// Creates a record. Success is 201 (id in `Location`) or 204 (id in
    /// `OData-EntityId`/`Location` when the remote supplies one).
    #[instrument(skip(self, payload, credentials), fields(entity_set = entity_set))]
    pub async fn post(
        &self,
        entity_set: &str,
        payload: &Value,
        credentials: &CredentialContext,
    ) -> OdataResult<CreateOutcome> {
        let url = format!("{}/{entity_set}", self.base_url);
        debug!(url = %url, "POST");
        let response = self
            .send(Method::POST, &url, Some(payload), &[], credentials)
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::NO_CONTENT {
            return Err(OdataError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        let identity_header = if status == StatusCode::CREATED {
            response.headers().get("Location")
        } else {
            response
                .headers()
                .get("OData-EntityId")
                .or_else(|| response.headers().get("Location"))
        };
        let record_id = identity_header
            .and_then(|v| v.to_str().ok())
            .and_then(parse_record_id);

        Ok(CreateOutcome {
            status: status.as_u16(),
            record_id,
        })
    }

    /// Applies a partial update to one record. Success is 204.
    #[instrument(skip(self, payload, credentials), fields(entity_set = entity_set, record_id = %record_id))]
    pub async fn patch(
        &self,
        entity_set: &str,
        record_id: Uuid,
        payload: &Value,
        credentials: &CredentialContext,
    ) -> OdataResult<()> {
        let url = format!("{}/{entity_set}({record_id})", self.base_url);
        debug!(url = %url, "PATCH");
        let response = self
            .send(Method::PATCH, &url, Some(payload), &[], credentials)
            .await?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            return Err(OdataError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }
        Ok(())
    }

    /// Runs the NTLM exchange and returns the final response.
    ///
    /// A fresh client (and so a fresh connection pool) per call keeps
    /// the handshake legs on one connection; NTLM authenticates the
    /// connection, not the request.
    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
        extra_headers: &[(String, String)],
        credentials: &CredentialContext,
    ) -> OdataResult<reqwest::Response> {
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        let host = url::Url::parse(url)?
            .host_str()
            .unwrap_or_default()
            .to_string();
        let mut handshake = NtlmHandshake::new(credentials, &format!("HTTP/{host}"))?;

        let negotiate = handshake.negotiate()?;
        let first = self
            .build_request(&http, method.clone(), url, payload, extra_headers, &negotiate)
            .send()
            .await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(first);
        }

        let challenge = {
            let offered: Vec<&str> = first
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            match find_challenge(offered.iter().copied()) {
                Some(challenge) => challenge.to_string(),
                None => {
                    // A 401 with no challenge is a plain rejection.
                    return Err(OdataError::AuthenticationFailed {
                        body: first.text().await.unwrap_or_default(),
                    });
                }
            }
        };

        let authenticate = handshake.authenticate(&challenge)?;
        let second = self
            .build_request(&http, method, url, payload, extra_headers, &authenticate)
            .send()
            .await?;
        Ok(second)
    }

    fn build_request(
        &self,
        http: &reqwest::Client,
        method: Method,
        url: &str,
        payload: Option<&Value>,
        extra_headers: &[(String, String)],
        authorization: &str,
    ) -> reqwest::RequestBuilder {
        let mut request = http
            .request(method, url)
            .header("Authorization", authorization)
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0");
        for (name, value) in extra_headers {
            request = request.header(name, value);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        request
    }
}
