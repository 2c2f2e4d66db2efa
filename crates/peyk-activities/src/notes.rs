//! Annotations (notes and attachments) on activities.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use peyk_odata::{CredentialContext, ODataPage, OdataClient, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{ActivityError, ActivityResult};

const SUBJECT_PREFIX_LEN: usize = 50;
const DEFAULT_ATTACHMENT_NAME: &str = "Attachment";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file carried by a note, base64-encoded as the remote stores it.
#[derive(Debug, Clone)]
pub struct NoteAttachment {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    /// Base64 document body.
    pub body: String,
}

/// Input for creating a note. At least one of `text` or an attachment
/// body must be present.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub subject: Option<String>,
    pub text: Option<String>,
    pub attachment: Option<NoteAttachment>,
}

impl NoteDraft {
    /// Subject actually written: the explicit subject, else the
    /// attachment filename, else a prefix of the text, else `Note`.
    fn subject_line(&self) -> String {
        if let Some(subject) = self.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return subject.to_string();
        }
        if let Some(name) = self
            .attachment
            .as_ref()
            .and_then(|a| a.filename.as_deref())
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return text.chars().take(SUBJECT_PREFIX_LEN).collect();
        }
        "Note".to_string()
    }

    fn is_empty(&self) -> bool {
        let no_text = self
            .text
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty();
        let no_body = self
            .attachment
            .as_ref()
            .map(|a| a.body.trim().is_empty())
            .unwrap_or(true);
        no_text && no_body
    }
}

#[derive(Debug, Deserialize)]
struct AuthorRow {
    #[serde(rename = "fullname")]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoteRow {
    #[serde(rename = "annotationid")]
    id: Uuid,
    subject: Option<String>,
    #[serde(rename = "notetext")]
    text: Option<String>,
    filename: Option<String>,
    #[serde(rename = "mimetype")]
    mime_type: Option<String>,
    #[serde(rename = "createdon")]
    created_on: Option<DateTime<Utc>>,
    #[serde(rename = "createdby")]
    created_by: Option<AuthorRow>,
}

/// A note as served to callers. The document body stays on the remote
/// until explicitly downloaded.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

/// A downloaded attachment, decoded and ready to serve.
#[derive(Debug, Clone)]
pub struct NoteDownload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl NoteDownload {
    /// `Content-Disposition` value with an RFC 5987 encoded filename.
    #[must_use]
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename*=UTF-8''{}",
            utf8_percent_encode(&self.filename, NON_ALPHANUMERIC)
        )
    }
}

/// Creates, lists and downloads annotations.
#[derive(Debug, Clone)]
pub struct NoteService {
    client: OdataClient,
}

impl NoteService {
    #[must_use]
    pub fn new(client: OdataClient) -> Self {
        Self { client }
    }

    /// Creates a note on an activity. An empty draft is rejected before
    /// any network traffic.
    #[instrument(skip(self, draft, credentials), fields(activity_id = %activity_id))]
    pub async fn create_note(
        &self,
        activity_id: Uuid,
        draft: &NoteDraft,
        credentials: &CredentialContext,
    ) -> ActivityResult<Option<Uuid>> {
        if draft.is_empty() {
            return Err(ActivityError::invalid_input(
                "a note needs text or an attachment",
            ));
        }

        let mut payload = Map::new();
        payload.insert("subject".into(), Value::String(draft.subject_line()));
        if let Some(text) = draft.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            payload.insert("notetext".into(), Value::String(text.to_string()));
        }
        if let Some(attachment) = &draft.attachment {
            if !attachment.body.trim().is_empty() {
                payload.insert("documentbody".into(), Value::String(attachment.body.clone()));
                payload.insert(
                    "filename".into(),
                    Value::String(
                        attachment
                            .filename
                            .clone()
                            .filter(|n| !n.is_empty())
                            .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string()),
                    ),
                );
                if let Some(mime) = &attachment.mime_type {
                    payload.insert("mimetype".into(), Value::String(mime.clone()));
                }
            }
        }
        payload.insert(
            "objectid_task@odata.bind".into(),
            Value::String(format!("/tasks({activity_id})")),
        );

        let outcome = self
            .client
            .post("annotations", &Value::Object(payload), credentials)
            .await?;
        Ok(outcome.record_id)
    }

    /// Lists an activity's notes, newest first, without document
    /// bodies.
    #[instrument(skip(self, credentials), fields(activity_id = %activity_id))]
    pub async fn fetch_notes(
        &self,
        activity_id: Uuid,
        credentials: &CredentialContext,
    ) -> ActivityResult<Vec<Note>> {
        let query = Query::new()
            .select([
                "annotationid",
                "subject",
                "notetext",
                "filename",
                "mimetype",
                "createdon",
            ])
            .filter(format!("_objectid_value eq {activity_id}"))
            .order_by("createdon desc")
            .expand("createdby($select=fullname)");
        let page: ODataPage<NoteRow> = self.client.get("annotations", &query, credentials).await?;
        Ok(page
            .value
            .into_iter()
            .map(|row| Note {
                id: row.id,
                subject: row.subject,
                text: row.text,
                filename: row.filename,
                mime_type: row.mime_type,
                created_on: row.created_on,
                author: row.created_by.and_then(|a| a.full_name),
            })
            .collect())
    }

    /// Downloads one note's attachment. A note without a document body
    /// is reported as not found.
    #[instrument(skip(self, credentials), fields(note_id = %note_id))]
    pub async fn download_note(
        &self,
        note_id: Uuid,
        credentials: &CredentialContext,
    ) -> ActivityResult<NoteDownload> {
        #[derive(Debug, Deserialize)]
        struct BodyRow {
            #[serde(rename = "documentbody")]
            body: Option<String>,
            filename: Option<String>,
            #[serde(rename = "mimetype")]
            mime_type: Option<String>,
        }

        let query = Query::new().select(["documentbody", "filename", "mimetype"]);
        let row: BodyRow = self
            .client
            .get(&format!("annotations({note_id})"), &query, credentials)
            .await?;

        let body = row
            .body
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ActivityError::not_found(format!("note {note_id} has no attachment")))?;
        Ok(NoteDownload {
            bytes: BASE64.decode(body.as_bytes())?,
            filename: row
                .filename
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string()),
            mime_type: row
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        })
    }
}
