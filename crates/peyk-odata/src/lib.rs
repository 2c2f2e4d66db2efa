//! OData v4 transport for on-prem, NTLM-authenticated CRM endpoints.
//!
//! This crate owns the plumbing shared by every CRM feature:
//!
//! - [`OdataClient`]: one authenticated request per call (fresh NTLM
//!   handshake, no retries), with the GET⇒200 / POST⇒201|204 /
//!   PATCH⇒204 success contracts.
//! - [`Query`]: declarative query descriptor rendered to a request URL,
//!   with cursor pass-through and literal escaping.
//! - [`replace_tokens`]: relative date and identity tokens
//!   (`{TODAY}`, `{TODAY+N}`, `{MONTH_START}`, `{USERID}`, …) resolved
//!   against a single clock reading.
//! - [`CredentialContext`] and [`CredentialCipher`]: per-request
//!   credentials and their at-rest encryption.
//!
//! # Example
//!
//! ```no_run
//! use peyk_odata::{CredentialContext, ODataPage, OdataClient, Query};
//!
//! # async fn run() -> Result<(), peyk_odata::OdataError> {
//! let client = OdataClient::new("http://crm.local/org/api/data/v9.1");
//! let creds = CredentialContext::new("CORP", "jdoe", "secret");
//! let query = Query::new()
//!     .select(["subject", "scheduledend"])
//!     .filter("statecode eq 0")
//!     .top(50);
//! let page: ODataPage<serde_json::Value> =
//!     client.get("activitypointers", &query, &creds).await?;
//! # Ok(())
//! # }
//! ```

mod bind;
mod client;
mod credentials;
mod crypto;
mod error;
mod ntlm;
mod query;
mod tokens;

pub use bind::{strip_empty_binds, BindRef, BIND_SUFFIX};
pub use client::{parse_record_id, CreateOutcome, ODataPage, OdataClient};
pub use credentials::CredentialContext;
pub use crypto::{generate_master_key, CredentialCipher};
pub use error::{OdataError, OdataResult};
pub use query::{escape_literal, Query, FORMATTED_VALUE_ANNOTATION};
pub use tokens::replace_tokens;
