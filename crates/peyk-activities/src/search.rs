//! Cross-entity record search, used to pick regarding targets and
//! owners.

use futures::future::join_all;
use peyk_odata::{escape_literal, CredentialContext, ODataPage, OdataClient, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{ActivityError, ActivityResult};

const MIN_TERM_LEN: usize = 2;
const REGARDING_OPTION_LIMIT: u32 = 2000;

/// Searchable entity descriptors.
struct SearchKind {
    kind: &'static str,
    set: &'static str,
    id_attr: &'static str,
    display_attr: &'static str,
}

const SEARCH_KINDS: [SearchKind; 6] = [
    SearchKind {
        kind: "account",
        set: "accounts",
        id_attr: "accountid",
        display_attr: "name",
    },
    SearchKind {
        kind: "contact",
        set: "contacts",
        id_attr: "contactid",
        display_attr: "fullname",
    },
    SearchKind {
        kind: "lead",
        set: "leads",
        id_attr: "leadid",
        display_attr: "fullname",
    },
    SearchKind {
        kind: "opportunity",
        set: "opportunities",
        id_attr: "opportunityid",
        display_attr: "name",
    },
    SearchKind {
        kind: "incident",
        set: "incidents",
        id_attr: "incidentid",
        display_attr: "title",
    },
    SearchKind {
        kind: "systemuser",
        set: "systemusers",
        id_attr: "systemuserid",
        display_attr: "fullname",
    },
];

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub name: String,
    /// Logical entity name the hit belongs to.
    pub kind: String,
    /// Context line: a contact's parent account, an account's first
    /// contact.
    pub detail: Option<String>,
}

/// A bare id/name pair for pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRecord {
    pub id: Uuid,
    pub name: String,
}

/// Candidate regarding targets for the create form.
#[derive(Debug, Serialize)]
pub struct RegardingOptions {
    pub accounts: Vec<NamedRecord>,
    pub contacts: Vec<NamedRecord>,
}

/// Searches one entity type by display name. The term must be at least
/// two characters after trimming.
#[instrument(skip(client, credentials))]
pub async fn search_records(
    client: &OdataClient,
    kind: &str,
    term: &str,
    credentials: &CredentialContext,
) -> ActivityResult<Vec<SearchHit>> {
    let term = term.trim();
    if term.chars().count() < MIN_TERM_LEN {
        return Err(ActivityError::invalid_input(
            "search term must be at least 2 characters",
        ));
    }
    let descriptor = SEARCH_KINDS
        .iter()
        .find(|d| d.kind == kind)
        .ok_or_else(|| ActivityError::invalid_input(format!("unsupported search type: {kind}")))?;

    let mut select = vec![descriptor.id_attr, descriptor.display_attr];
    if descriptor.kind == "contact" {
        select.push("_parentcustomerid_value");
    }
    let query = Query::new()
        .select(select)
        .filter(format!(
            "contains({},'{}')",
            descriptor.display_attr,
            escape_literal(term)
        ))
        .order_by(descriptor.display_attr)
        .top(50)
        .prefer_formatted_values();

    let page: ODataPage<Value> = client.get(descriptor.set, &query, credentials).await?;
    let mut hits: Vec<SearchHit> = page
        .value
        .iter()
        .filter_map(|row| {
            let id = row
                .get(descriptor.id_attr)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())?;
            let name = row
                .get(descriptor.display_attr)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let detail = match descriptor.kind {
                "contact" => row
                    .get("_parentcustomerid_value@OData.Community.Display.V1.FormattedValue")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            };
            Some(SearchHit {
                id,
                name,
                kind: descriptor.kind.to_string(),
                detail,
            })
        })
        .collect();

    if descriptor.kind == "account" {
        attach_first_contacts(client, &mut hits, credentials).await;
    }
    Ok(hits)
}

/// Fills account hits with their first contact's name. Lookup failures
/// leave the detail empty.
async fn attach_first_contacts(
    client: &OdataClient,
    hits: &mut [SearchHit],
    credentials: &CredentialContext,
) {
    #[derive(Debug, Deserialize)]
    struct ContactName {
        fullname: Option<String>,
    }

    let details = join_all(hits.iter().map(|hit| async move {
        let query = Query::new()
            .select(["fullname"])
            .filter(format!("_parentcustomerid_value eq {}", hit.id))
            .top(1);
        match client
            .get::<ODataPage<ContactName>>("contacts", &query, credentials)
            .await
        {
            Ok(page) => page.value.into_iter().next().and_then(|c| c.fullname),
            Err(err) => {
                warn!(account = %hit.id, error = %err, "first-contact lookup failed");
                None
            }
        }
    }))
    .await;

    for (hit, detail) in hits.iter_mut().zip(details) {
        hit.detail = detail;
    }
}

/// Full account list for the regarding picker.
pub async fn fetch_accounts(
    client: &OdataClient,
    credentials: &CredentialContext,
) -> ActivityResult<Vec<NamedRecord>> {
    fetch_named(client, "accounts", "accountid", "name", credentials).await
}

/// Full contact list for the regarding picker.
pub async fn fetch_contacts(
    client: &OdataClient,
    credentials: &CredentialContext,
) -> ActivityResult<Vec<NamedRecord>> {
    fetch_named(client, "contacts", "contactid", "fullname", credentials).await
}

/// Both pickers, fetched concurrently.
pub async fn regarding_options(
    client: &OdataClient,
    credentials: &CredentialContext,
) -> ActivityResult<RegardingOptions> {
    let (accounts, contacts) = futures::join!(
        fetch_accounts(client, credentials),
        fetch_contacts(client, credentials)
    );
    Ok(RegardingOptions {
        accounts: accounts?,
        contacts: contacts?,
    })
}

async fn fetch_named(
    client: &OdataClient,
    set: &str,
    id_attr: &str,
    display_attr: &str,
    credentials: &CredentialContext,
) -> ActivityResult<Vec<NamedRecord>> {
    let query = Query::new()
        .select([id_attr, display_attr])
        .order_by(display_attr)
        .top(REGARDING_OPTION_LIMIT);
    let page: ODataPage<Value> = client.get(set, &query, credentials).await?;
    Ok(page
        .value
        .iter()
        .filter_map(|row| {
            let id = row
                .get(id_attr)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())?;
            let name = row
                .get(display_attr)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(NamedRecord { id, name })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> CredentialContext {
        CredentialContext::new("CORP", "jdoe", "pw")
    }

    #[tokio::test]
    async fn rejects_short_terms_before_any_request() {
        let server = MockServer::start().await;
        let client = OdataClient::new(server.uri());
        let err = search_records(&client, "account", " a ", &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::InvalidInput(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_kinds() {
        let server = MockServer::start().await;
        let client = OdataClient::new(server.uri());
        let err = search_records(&client, "invoice", "acme", &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn escapes_quotes_in_the_search_term() {
        let server = MockServer::start().await;
        let contact = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .and(query_param(
                "$filter",
                "contains(fullname,'O''Brien')",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "contactid": contact.to_string(),
                    "fullname": "Pat O'Brien",
                    "_parentcustomerid_value@OData.Community.Display.V1.FormattedValue": "Acme"
                }]
            })))
            .mount(&server)
            .await;

        let client = OdataClient::new(server.uri());
        let hits = search_records(&client, "contact", "O'Brien", &credentials())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Pat O'Brien");
        assert_eq!(hits[0].detail.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn account_hits_pick_up_their_first_contact() {
        let server = MockServer::start().await;
        let account = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"accountid": account.to_string(), "name": "Acme"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"fullname": "Sara Ahmadi"}]
            })))
            .mount(&server)
            .await;

        let client = OdataClient::new(server.uri());
        let hits = search_records(&client, "account", "acme", &credentials())
            .await
            .unwrap();
        assert_eq!(hits[0].detail.as_deref(), Some("Sara Ahmadi"));
    }
}
