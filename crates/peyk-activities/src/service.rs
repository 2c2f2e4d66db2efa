//! Activity feed queries and mutations.
//!
//! Reads go through the `activitypointers` set, which spans every
//! activity type; writes target the concrete set of the activity's
//! type (`tasks`, `phonecalls`, …). Listing is a two-pass affair: one
//! page of pointer rows, then a single batched fetch of task-only
//! columns for the task rows on that page.

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use peyk_odata::{
    replace_tokens, strip_empty_binds, BindRef, CreateOutcome, CredentialContext, ODataPage,
    OdataClient, Query,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::colors::{EntityColorCache, DEFAULT_ENTITY_COLOR};
use crate::error::{ActivityError, ActivityResult};
use crate::status::{clamp_state, entity_set, resolve_status, state_label, status_label};
use crate::types::{
    regarding_entity_set, Activity, ActivityDraft, ActivityPage, ActivityPatch, ActivityQuery,
    ActivityRow, OwnerRef, RegardingRef, TaskExtrasRow,
};

/// Columns selected from `activitypointers` for both list and detail.
const POINTER_COLUMNS: [&str; 16] = [
    "activityid",
    "activitytypecode",
    "subject",
    "description",
    "scheduledstart",
    "scheduledend",
    "actualstart",
    "actualend",
    "prioritycode",
    "statecode",
    "statuscode",
    "createdon",
    "modifiedon",
    "_ownerid_value",
    "_regardingobjectid_value",
    "_createdby_value",
];

const TASK_EXTRA_COLUMNS: [&str; 3] = ["activityid", "new_seen", "_new_lastowner_value"];

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Name shown when the remote attaches no formatted value to a lookup.
const MISSING_NAME: &str = "-";

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(rename = "activityid")]
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct UserNameRow {
    #[serde(rename = "fullname")]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamNameRow {
    name: Option<String>,
}

/// Query and mutation facade over one CRM endpoint.
#[derive(Debug, Clone)]
pub struct ActivityService {
    client: OdataClient,
    colors: EntityColorCache,
}

impl ActivityService {
    #[must_use]
    pub fn new(client: OdataClient) -> Self {
        Self {
            client,
            colors: EntityColorCache::new(),
        }
    }

    /// Lists one page of enriched activities.
    ///
    /// A continuation cursor in the query wins over every other field;
    /// the cursor URL is replayed verbatim.
    #[instrument(skip(self, credentials), fields(cursor = query.cursor.is_some()))]
    pub async fn query_activities(
        &self,
        query: &ActivityQuery,
        credentials: &CredentialContext,
    ) -> ActivityResult<ActivityPage> {
        let odata_query = match &query.cursor {
            Some(cursor) => Query::from_cursor(cursor.as_str()),
            None => {
                let mut q = Query::new()
                    .select(POINTER_COLUMNS)
                    .order_by("scheduledstart desc");
                if let Some(filter) = &query.filter {
                    let user_id = query.user_id.map(|u| u.to_string()).unwrap_or_default();
                    q = q.filter(replace_tokens(filter, &user_id, Utc::now()));
                }
                q
            }
        }
        .prefer_max_page_size(query.page_size.unwrap_or(DEFAULT_PAGE_SIZE))
        .prefer_formatted_values();

        let page: ODataPage<ActivityRow> = self
            .client
            .get("activitypointers", &odata_query, credentials)
            .await?;

        debug!(rows = page.value.len(), more = page.next_link.is_some(), "fetched activity page");
        let activities = self.enrich(page.value, credentials).await;
        Ok(ActivityPage {
            activities,
            next_cursor: page.next_link,
        })
    }

    /// Fetches one activity with every annotation the remote offers.
    #[instrument(skip(self, credentials), fields(id = %id))]
    pub async fn get_activity(
        &self,
        id: Uuid,
        credentials: &CredentialContext,
    ) -> ActivityResult<Activity> {
        let query = Query::new().select(POINTER_COLUMNS).prefer_all_annotations();
        let row: ActivityRow = self
            .client
            .get(&format!("activitypointers({id})"), &query, credentials)
            .await?;

        let extras = if row.kind == "task" {
            let query = Query::new()
                .select(["new_seen", "_new_lastowner_value"])
                .prefer_formatted_values();
            match self
                .client
                .get::<TaskExtrasRow>(&format!("tasks({id})"), &query, credentials)
                .await
            {
                Ok(extras) => Some(extras),
                Err(err) => {
                    warn!(id = %id, error = %err, "task extras fetch failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(build_activity(
            row,
            DEFAULT_ENTITY_COLOR.to_string(),
            extras.as_ref(),
        ))
    }

    /// Creates an activity and returns its id when the remote reveals
    /// one. A 204 response without identity headers triggers one
    /// best-effort lookup by subject and owner; if that also comes up
    /// empty the create still counts as a success with no id.
    #[instrument(skip(self, draft, credentials), fields(kind = draft.kind()))]
    pub async fn create_activity(
        &self,
        draft: &ActivityDraft,
        credentials: &CredentialContext,
    ) -> ActivityResult<Option<Uuid>> {
        let (set, payload) = create_payload(draft)?;
        let outcome = self.client.post(&set, &payload, credentials).await?;

        if let Some(id) = outcome.record_id {
            return Ok(Some(id));
        }
        let CreateOutcome { status, .. } = outcome;
        debug!(status, "create returned no identity header, falling back to lookup");
        Ok(self.find_created(&set, draft, credentials).await)
    }

    /// Identity fallback: newest record in the set with the draft's
    /// subject and owner. Any failure here is logged and swallowed.
    async fn find_created(
        &self,
        set: &str,
        draft: &ActivityDraft,
        credentials: &CredentialContext,
    ) -> Option<Uuid> {
        let filter = format!(
            "subject eq '{}' and _ownerid_value eq {}",
            draft.subject.replace('\'', "''"),
            draft.owner_id
        );
        let query = Query::new()
            .select(["activityid"])
            .filter(filter)
            .order_by("createdon desc")
            .top(1);
        match self
            .client
            .get::<ODataPage<IdRow>>(set, &query, credentials)
            .await
        {
            Ok(page) => page.value.first().map(|row| row.id),
            Err(err) => {
                warn!(error = %err, "created-record lookup failed");
                None
            }
        }
    }

    /// Applies a partial update, resolving state and status through the
    /// lifecycle table. Completing an activity stamps `percentcomplete`
    /// and `actualend`.
    #[instrument(skip(self, patch, credentials), fields(id = %id, kind = kind))]
    pub async fn update_activity(
        &self,
        id: Uuid,
        kind: &str,
        patch: &ActivityPatch,
        credentials: &CredentialContext,
    ) -> ActivityResult<()> {
        let payload = update_payload(kind, patch)?;
        self.client
            .patch(&entity_set(kind), id, &payload, credentials)
            .await?;
        Ok(())
    }

    /// Resolves a display name for an owner id, trying users first and
    /// teams second. Comes up as `-` when neither matches.
    pub async fn resolve_owner_name(
        &self,
        owner_id: Uuid,
        credentials: &CredentialContext,
    ) -> String {
        let query = Query::new().select(["fullname"]);
        if let Ok(user) = self
            .client
            .get::<UserNameRow>(&format!("systemusers({owner_id})"), &query, credentials)
            .await
        {
            if let Some(name) = user.full_name.filter(|n| !n.is_empty()) {
                return name;
            }
        }
        let query = Query::new().select(["name"]);
        match self
            .client
            .get::<TeamNameRow>(&format!("teams({owner_id})"), &query, credentials)
            .await
        {
            Ok(team) => team
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| MISSING_NAME.to_string()),
            Err(_) => MISSING_NAME.to_string(),
        }
    }

    /// Merges colors and task extras into raw pointer rows.
    async fn enrich(
        &self,
        rows: Vec<ActivityRow>,
        credentials: &CredentialContext,
    ) -> Vec<Activity> {
        let mut kinds: Vec<&str> = rows.iter().map(|r| r.kind.as_str()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        let colors = join_all(kinds.iter().map(|kind| async {
            (
                (*kind).to_string(),
                self.colors.get(&self.client, credentials, kind).await,
            )
        }))
        .await;
        let color_of = |kind: &str| {
            colors
                .iter()
                .find(|(k, _)| k == kind)
                .map(|(_, c)| c.clone())
                .unwrap_or_else(|| DEFAULT_ENTITY_COLOR.to_string())
        };

        let task_ids: Vec<Uuid> = rows
            .iter()
            .filter(|r| r.kind == "task")
            .map(|r| r.id)
            .collect();
        let extras = self.fetch_task_extras(&task_ids, credentials).await;

        rows.into_iter()
            .map(|row| {
                let color = color_of(&row.kind);
                let row_extras = extras.iter().find(|e| e.id == row.id);
                build_activity(row, color, row_extras)
            })
            .collect()
    }

    /// Batched fetch of task-only columns. Failures degrade to no
    /// extras rather than failing the page.
    async fn fetch_task_extras(
        &self,
        task_ids: &[Uuid],
        credentials: &CredentialContext,
    ) -> Vec<TaskExtrasRow> {
        if task_ids.is_empty() {
            return Vec::new();
        }
        let filter = task_ids
            .iter()
            .map(|id| format!("activityid eq {id}"))
            .collect::<Vec<_>>()
            .join(" or ");
        let query = Query::new()
            .select(TASK_EXTRA_COLUMNS)
            .filter(filter)
            .prefer_formatted_values();
        match self
            .client
            .get::<ODataPage<TaskExtrasRow>>("tasks", &query, credentials)
            .await
        {
            Ok(page) => page.value,
            Err(err) => {
                warn!(tasks = task_ids.len(), error = %err, "task extras batch failed");
                Vec::new()
            }
        }
    }
}

/// Assembles the caller-facing activity from its raw pieces.
fn build_activity(row: ActivityRow, color: String, extras: Option<&TaskExtrasRow>) -> Activity {
    let owner = OwnerRef {
        id: row.owner_id,
        name: row
            .formatted("_ownerid_value")
            .unwrap_or(MISSING_NAME)
            .to_string(),
    };
    let regarding = row.regarding_id.map(|id| RegardingRef {
        id,
        name: row
            .formatted("_regardingobjectid_value")
            .unwrap_or_default()
            .to_string(),
        kind: row
            .lookup_logical_name("_regardingobjectid_value")
            .unwrap_or_default()
            .to_string(),
    });
    let created_by = row.created_by_id.map(|id| OwnerRef {
        id: Some(id),
        name: row
            .formatted("_createdby_value")
            .unwrap_or(MISSING_NAME)
            .to_string(),
    });
    let last_owner = extras.and_then(|e| {
        e.last_owner_id.map(|id| OwnerRef {
            id: Some(id),
            name: e
                .formatted("_new_lastowner_value")
                .unwrap_or(MISSING_NAME)
                .to_string(),
        })
    });

    Activity {
        id: row.id,
        state_label: row.state.map(state_label),
        status_label: row.status.and_then(|s| status_label(&row.kind, s)),
        kind: row.kind,
        subject: row.subject,
        description: row.description,
        scheduled_start: row.scheduled_start,
        scheduled_end: row.scheduled_end,
        actual_start: row.actual_start,
        actual_end: row.actual_end,
        priority: row.priority,
        state: row.state,
        status: row.status,
        owner,
        color,
        regarding,
        created_by,
        created_on: row.created_on,
        modified_on: row.modified_on,
        seen: extras.and_then(|e| e.seen).unwrap_or(false),
        last_owner,
    }
}

/// Builds the create payload and the target entity set.
///
/// Caller-supplied extras go in first and may never smuggle in
/// lifecycle or ownership columns; those are owned by this layer.
fn create_payload(draft: &ActivityDraft) -> ActivityResult<(String, Value)> {
    if draft.subject.trim().is_empty() {
        return Err(ActivityError::invalid_input("subject must not be empty"));
    }
    let kind = draft.kind();

    let mut payload = draft.extra.clone();
    for reserved in ["statecode", "statuscode", "actualstart", "ownerid", "activityid"] {
        payload.remove(reserved);
    }

    payload.insert("subject".into(), Value::String(draft.subject.clone()));
    if let Some(description) = &draft.description {
        payload.insert("description".into(), Value::String(description.clone()));
    }
    if let Some(start) = draft.scheduled_start {
        payload.insert(
            "scheduledstart".into(),
            Value::String(start.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    payload.insert(
        "scheduledend".into(),
        Value::String(draft.scheduled_end.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    if let Some(priority) = draft.priority {
        payload.insert("prioritycode".into(), Value::from(priority));
    }

    BindRef::new("ownerid", "systemusers", draft.owner_id.to_string()).apply(&mut payload);
    if let Some((regarding_kind, regarding_id)) = &draft.regarding {
        let set = regarding_entity_set(regarding_kind).ok_or_else(|| {
            ActivityError::invalid_input(format!(
                "unsupported regarding type: {regarding_kind}"
            ))
        })?;
        BindRef::new(
            format!("regardingobjectid_{regarding_kind}_{kind}"),
            set,
            regarding_id.to_string(),
        )
        .apply(&mut payload);
    }
    strip_empty_binds(&mut payload);

    Ok((entity_set(kind), Value::Object(payload)))
}

/// Builds the update payload. The state is always written, clamped to
/// the writable range; the status falls back to the state's default.
fn update_payload(kind: &str, patch: &ActivityPatch) -> ActivityResult<Value> {
    let mut payload = Map::new();

    if let Some(subject) = &patch.subject {
        payload.insert("subject".into(), Value::String(subject.clone()));
    }
    if let Some(description) = &patch.description {
        payload.insert("description".into(), Value::String(description.clone()));
    }
    if let Some(start) = patch.scheduled_start {
        payload.insert(
            "scheduledstart".into(),
            Value::String(start.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    if let Some(end) = patch.scheduled_end {
        payload.insert(
            "scheduledend".into(),
            Value::String(end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    payload.insert(
        "prioritycode".into(),
        Value::from(patch.priority.unwrap_or(1)),
    );

    let state = clamp_state(patch.state.unwrap_or(0));
    payload.insert("statecode".into(), Value::from(state));
    payload.insert(
        "statuscode".into(),
        Value::from(patch.status.unwrap_or_else(|| resolve_status(kind, state))),
    );
    if state == 1 {
        payload.insert("percentcomplete".into(), Value::from(100));
        let actual_end = patch.actual_end.unwrap_or_else(Utc::now);
        payload.insert(
            "actualend".into(),
            Value::String(actual_end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }

    if let Some(seen) = patch.seen {
        payload.insert("new_seen".into(), Value::Bool(seen));
    }
    if let Some(owner_id) = patch.owner_id {
        BindRef::new("ownerid", "systemusers", owner_id.to_string()).apply(&mut payload);
    }
    if let Some((regarding_kind, regarding_id)) = &patch.regarding {
        let set = regarding_entity_set(regarding_kind).ok_or_else(|| {
            ActivityError::invalid_input(format!(
                "unsupported regarding type: {regarding_kind}"
            ))
        })?;
        BindRef::new(
            format!("regardingobjectid_{regarding_kind}_{kind}"),
            set,
            regarding_id.to_string(),
        )
        .apply(&mut payload);
    }
    strip_empty_binds(&mut payload);

    Ok(Value::Object(payload))
}
