#![allow(dead_code)]

use peyk_odata::{CredentialContext, OdataClient};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn credentials() -> CredentialContext {
    CredentialContext::new("CORP", "jdoe", "hunter2")
}

pub fn client(server: &MockServer) -> OdataClient {
    OdataClient::new(server.uri())
}

/// A minimal `activitypointer` row with formatted owner annotation.
pub fn pointer_row(id: Uuid, kind: &str, subject: &str) -> Value {
    json!({
        "activityid": id.to_string(),
        "activitytypecode": kind,
        "subject": subject,
        "scheduledstart": "2025-03-14T08:00:00Z",
        "scheduledend": "2025-03-14T09:00:00Z",
        "prioritycode": 1,
        "statecode": 0,
        "statuscode": kind_default_status(kind),
        "_ownerid_value": "3c3c3c3c-4444-4d4d-8e8e-5f5f5f5f5f5f",
        "_ownerid_value@OData.Community.Display.V1.FormattedValue": "Sara Ahmadi",
        "createdon": "2025-03-13T10:00:00Z"
    })
}

fn kind_default_status(kind: &str) -> i32 {
    match kind {
        "task" => 2,
        _ => 1,
    }
}

pub fn page(rows: Vec<Value>, next_link: Option<&str>) -> Value {
    match next_link {
        Some(link) => json!({"value": rows, "@odata.nextLink": link}),
        None => json!({"value": rows}),
    }
}

/// Serves an entity color for one logical name.
pub async fn mount_color(server: &MockServer, kind: &str, color: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/EntityDefinitions(LogicalName='{kind}')")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"EntityColor": color})))
        .mount(server)
        .await;
}

/// Serves the batched task-extras query.
pub async fn mount_task_extras(server: &MockServer, rows: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": rows})))
        .mount(server)
        .await;
}

pub fn task_extras_row(id: Uuid, seen: bool, last_owner: Option<(Uuid, &str)>) -> Value {
    let mut row = json!({
        "activityid": id.to_string(),
        "new_seen": seen
    });
    if let Some((owner_id, name)) = last_owner {
        row["_new_lastowner_value"] = json!(owner_id.to_string());
        row["_new_lastowner_value@OData.Community.Display.V1.FormattedValue"] = json!(name);
    }
    row
}
