//! Wire rows and enriched activity data model.
//!
//! Raw rows (`ActivityRow`, `TaskExtrasRow`) mirror the remote entity
//! shapes exactly, flattening OData annotations into a side map.
//! [`Activity`] is the enriched shape handed to callers after owner
//! names, colors and task extras are merged in.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use peyk_odata::FORMATTED_VALUE_ANNOTATION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Annotation suffix carrying a lookup's logical entity name.
pub const LOOKUP_LOGICAL_NAME_ANNOTATION: &str = "Microsoft.Dynamics.CRM.lookuplogicalname";

fn annotation<'a>(
    annotations: &'a HashMap<String, Value>,
    field: &str,
    suffix: &str,
) -> Option<&'a str> {
    annotations
        .get(&format!("{field}@{suffix}"))
        .and_then(Value::as_str)
}

/// A raw `activitypointer` row as the remote serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRow {
    #[serde(rename = "activityid")]
    pub id: Uuid,
    /// Activity type discriminant, e.g. `task`, `phonecall`.
    #[serde(rename = "activitytypecode", default)]
    pub kind: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "scheduledstart")]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(rename = "scheduledend")]
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(rename = "actualstart")]
    pub actual_start: Option<DateTime<Utc>>,
    #[serde(rename = "actualend")]
    pub actual_end: Option<DateTime<Utc>>,
    #[serde(rename = "prioritycode")]
    pub priority: Option<i32>,
    #[serde(rename = "statecode")]
    pub state: Option<i32>,
    #[serde(rename = "statuscode")]
    pub status: Option<i32>,
    #[serde(rename = "_ownerid_value")]
    pub owner_id: Option<Uuid>,
    #[serde(rename = "_regardingobjectid_value")]
    pub regarding_id: Option<Uuid>,
    #[serde(rename = "_createdby_value")]
    pub created_by_id: Option<Uuid>,
    #[serde(rename = "createdon")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(rename = "modifiedon")]
    pub modified_on: Option<DateTime<Utc>>,
    /// OData annotations (`field@…`) the select did not name explicitly.
    #[serde(flatten)]
    pub annotations: HashMap<String, Value>,
}

impl ActivityRow {
    /// Display text the remote attached to a field via the
    /// formatted-value annotation.
    #[must_use]
    pub fn formatted(&self, field: &str) -> Option<&str> {
        annotation(&self.annotations, field, FORMATTED_VALUE_ANNOTATION)
    }

    /// Logical entity name of a lookup field's target.
    #[must_use]
    pub fn lookup_logical_name(&self, field: &str) -> Option<&str> {
        annotation(&self.annotations, field, LOOKUP_LOGICAL_NAME_ANNOTATION)
    }
}

/// Task-only columns fetched in a second pass for rows of kind `task`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskExtrasRow {
    #[serde(rename = "activityid")]
    pub id: Uuid,
    #[serde(rename = "new_seen")]
    pub seen: Option<bool>,
    #[serde(rename = "_new_lastowner_value")]
    pub last_owner_id: Option<Uuid>,
    #[serde(flatten)]
    pub annotations: HashMap<String, Value>,
}

impl TaskExtrasRow {
    #[must_use]
    pub fn formatted(&self, field: &str) -> Option<&str> {
        annotation(&self.annotations, field, FORMATTED_VALUE_ANNOTATION)
    }
}

/// An owner or author reference with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerRef {
    pub id: Option<Uuid>,
    pub name: String,
}

/// The record an activity is filed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegardingRef {
    pub id: Uuid,
    pub name: String,
    /// Logical entity name of the target, e.g. `account`.
    pub kind: String,
}

/// An activity after enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub kind: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub priority: Option<i32>,
    pub state: Option<i32>,
    pub state_label: Option<&'static str>,
    pub status: Option<i32>,
    pub status_label: Option<&'static str>,
    pub owner: OwnerRef,
    /// Display color of the activity's type.
    pub color: String,
    pub regarding: Option<RegardingRef>,
    pub created_by: Option<OwnerRef>,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_on: Option<DateTime<Utc>>,
    /// Read flag; `false` unless a task extras row marks it seen.
    pub seen: bool,
    /// Task-only previous owner; `None` for other types.
    pub last_owner: Option<OwnerRef>,
}

/// One page of enriched activities.
#[derive(Debug, Serialize)]
pub struct ActivityPage {
    pub activities: Vec<Activity>,
    /// Cursor for the next page, to be passed back verbatim.
    pub next_cursor: Option<String>,
}

/// Parameters for an activity feed query.
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    /// Extra `$filter` expression, possibly carrying date/identity
    /// tokens.
    pub filter: Option<String>,
    /// Continuation cursor from a previous page; wins over everything
    /// else when set.
    pub cursor: Option<String>,
    pub page_size: Option<u32>,
    /// Caller identity substituted for `{USERID}` in the filter.
    pub user_id: Option<Uuid>,
}

/// Input for creating a new activity.
#[derive(Debug, Clone)]
pub struct ActivityDraft {
    pub subject: String,
    pub description: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: DateTime<Utc>,
    pub priority: Option<i32>,
    /// Activity type logical name; `task` when omitted.
    pub kind: Option<String>,
    pub owner_id: Uuid,
    /// Target record: logical name and id.
    pub regarding: Option<(String, Uuid)>,
    /// Extra attributes passed through to the create payload.
    pub extra: Map<String, Value>,
}

impl ActivityDraft {
    /// Creates a minimal draft of the default type.
    #[must_use]
    pub fn new(subject: impl Into<String>, scheduled_end: DateTime<Utc>, owner_id: Uuid) -> Self {
        Self {
            subject: subject.into(),
            description: None,
            scheduled_start: None,
            scheduled_end,
            priority: None,
            kind: None,
            owner_id,
            regarding: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("task")
    }
}

/// Partial update to an existing activity. Absent fields are left
/// untouched on the remote.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub priority: Option<i32>,
    /// Requested state; clamped to the writable range before sending.
    pub state: Option<i32>,
    /// Explicit status; resolved from the state when omitted.
    pub status: Option<i32>,
    /// When completing, the completion instant; defaults to now.
    pub actual_end: Option<DateTime<Utc>>,
    /// Task-only read flag.
    pub seen: Option<bool>,
    pub owner_id: Option<Uuid>,
    pub regarding: Option<(String, Uuid)>,
}

/// Entity sets an activity may be filed against. `systemuser` is a
/// valid lookup target but never a regarding bind.
#[must_use]
pub fn regarding_entity_set(kind: &str) -> Option<&'static str> {
    match kind {
        "account" => Some("accounts"),
        "contact" => Some("contacts"),
        "lead" => Some("leads"),
        "opportunity" => Some("opportunities"),
        "incident" => Some("incidents"),
        "new_proformainvoice" => Some("new_proformainvoices"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_reads_formatted_annotations() {
        let row: ActivityRow = serde_json::from_value(json!({
            "activityid": "7b0c5f7e-1111-4a4a-9b9b-2d2d2d2d2d2d",
            "activitytypecode": "phonecall",
            "subject": "follow up",
            "_ownerid_value": "3c3c3c3c-4444-4d4d-8e8e-5f5f5f5f5f5f",
            "_ownerid_value@OData.Community.Display.V1.FormattedValue": "Sara Ahmadi",
            "_regardingobjectid_value@Microsoft.Dynamics.CRM.lookuplogicalname": "account"
        }))
        .unwrap();
        assert_eq!(row.kind, "phonecall");
        assert_eq!(row.formatted("_ownerid_value"), Some("Sara Ahmadi"));
        assert_eq!(
            row.lookup_logical_name("_regardingobjectid_value"),
            Some("account")
        );
        assert_eq!(row.formatted("subject"), None);
    }

    #[test]
    fn row_tolerates_missing_optionals() {
        let row: ActivityRow = serde_json::from_value(json!({
            "activityid": "7b0c5f7e-1111-4a4a-9b9b-2d2d2d2d2d2d"
        }))
        .unwrap();
        assert!(row.kind.is_empty());
        assert!(row.subject.is_none());
        assert!(row.state.is_none());
    }

    #[test]
    fn draft_defaults_to_task() {
        let draft = ActivityDraft::new("call", Utc::now(), Uuid::new_v4());
        assert_eq!(draft.kind(), "task");
    }

    #[test]
    fn regarding_sets_exclude_users() {
        assert_eq!(regarding_entity_set("account"), Some("accounts"));
        assert_eq!(regarding_entity_set("opportunity"), Some("opportunities"));
        assert_eq!(regarding_entity_set("systemuser"), None);
        assert_eq!(regarding_entity_set("widget"), None);
    }
}
