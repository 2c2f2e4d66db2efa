mod common;

use chrono::{TimeZone, Utc};
use common::{client, credentials};
use peyk_activities::{ActivityDraft, ActivityError, ActivityPatch, ActivityService};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn draft(owner: Uuid) -> ActivityDraft {
    ActivityDraft::new(
        "call O'Brien",
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
        owner,
    )
}

#[tokio::test]
async fn create_reads_the_id_from_a_201_location() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Location",
            format!("{}/tasks({id})", server.uri()).as_str(),
        ))
        .mount(&server)
        .await;

    let service = ActivityService::new(client(&server));
    let created = service
        .create_activity(&draft(Uuid::new_v4()), &credentials())
        .await
        .unwrap();
    assert_eq!(created, Some(id));
}

#[tokio::test]
async fn create_204_with_identity_header_skips_the_lookup() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(204).insert_header(
            "OData-EntityId",
            format!("{}/tasks({id})", server.uri()).as_str(),
        ))
        .mount(&server)
        .await;

    let service = ActivityService::new(client(&server));
    let created = service
        .create_activity(&draft(Uuid::new_v4()), &credentials())
        .await
        .unwrap();
    assert_eq!(created, Some(id));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "POST"));
}

#[tokio::test]
async fn create_204_without_headers_falls_back_to_a_lookup() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"activityid": id.to_string()}]
        })))
        .mount(&server)
        .await;

    let service = ActivityService::new(client(&server));
    let created = service
        .create_activity(&draft(owner), &credentials())
        .await
        .unwrap();
    assert_eq!(created, Some(id));

    let requests = server.received_requests().await.unwrap();
    let lookup = requests
        .iter()
        .find(|r| r.method.as_str() == "GET")
        .unwrap();
    let filter: String = lookup
        .url
        .query_pairs()
        .find(|(k, _)| k == "$filter")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(filter.contains("subject eq 'call O''Brien'"));
    assert!(filter.contains(&owner.to_string()));
}

#[tokio::test]
async fn create_204_lookup_miss_is_still_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    let service = ActivityService::new(client(&server));
    let created = service
        .create_activity(&draft(Uuid::new_v4()), &credentials())
        .await
        .unwrap();
    assert_eq!(created, None);
}

#[tokio::test]
async fn create_sends_the_owner_bind_and_no_lifecycle_columns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/phonecalls"))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Location",
            format!("{}/phonecalls({})", server.uri(), Uuid::new_v4()).as_str(),
        ))
        .mount(&server)
        .await;

    let owner = Uuid::new_v4();
    let mut d = draft(owner);
    d.kind = Some("phonecall".into());
    d.extra.insert("statecode".into(), json!(1));
    d.extra.insert("phonenumber".into(), json!("555-0199"));

    let service = ActivityService::new(client(&server));
    service.create_activity(&d, &credentials()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["ownerid@odata.bind"],
        format!("/systemusers({owner})")
    );
    assert_eq!(body["phonenumber"], "555-0199");
    assert!(body.get("statecode").is_none());
}

#[tokio::test]
async fn completing_a_task_stamps_percent_and_actual_end() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/tasks({id})")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let patch = ActivityPatch {
        state: Some(1),
        ..ActivityPatch::default()
    };
    let service = ActivityService::new(client(&server));
    service
        .update_activity(id, "task", &patch, &credentials())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["statecode"], 1);
    assert_eq!(body["statuscode"], 5);
    assert_eq!(body["percentcomplete"], 100);
    assert!(body["actualend"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn updates_target_the_concrete_entity_set() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/phonecalls({id})")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let patch = ActivityPatch {
        state: Some(2),
        ..ActivityPatch::default()
    };
    let service = ActivityService::new(client(&server));
    service
        .update_activity(id, "phonecall", &patch, &credentials())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["statuscode"], 3);
    assert!(body.get("percentcomplete").is_none());
}

#[tokio::test]
async fn update_failure_surfaces_the_remote_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid statuscode"))
        .mount(&server)
        .await;

    let service = ActivityService::new(client(&server));
    let err = service
        .update_activity(
            Uuid::new_v4(),
            "task",
            &ActivityPatch::default(),
            &credentials(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("invalid statuscode"));
}

#[tokio::test]
async fn unknown_regarding_type_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let mut d = draft(Uuid::new_v4());
    d.regarding = Some(("systemuser".into(), Uuid::new_v4()));

    let service = ActivityService::new(client(&server));
    let err = service.create_activity(&d, &credentials()).await.unwrap_err();
    assert!(matches!(err, ActivityError::InvalidInput(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
