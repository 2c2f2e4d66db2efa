//! Activity query and mutation engine for Dynamics-style CRM backends.
//!
//! Built on [`peyk_odata`] for transport, this crate owns the domain
//! logic:
//!
//! - [`ActivityService`]: enriched activity feeds (colors, owner
//!   names, task extras), creation with identity recovery, and
//!   lifecycle-aware partial updates.
//! - [`status`]: the static state/status table for every supported
//!   activity type.
//! - [`NoteService`]: annotations, with attachments, on activities.
//! - [`search_records`]: cross-entity record search for regarding and
//!   owner pickers.
//!
//! All operations take a [`CredentialContext`] per call; nothing is
//! cached across identities except entity colors, which are
//! identity-independent metadata.
//!
//! [`CredentialContext`]: peyk_odata::CredentialContext

pub mod colors;
pub mod error;
pub mod notes;
pub mod search;
pub mod service;
pub mod status;
pub mod types;

pub use colors::{EntityColorCache, DEFAULT_ENTITY_COLOR};
pub use error::{ActivityError, ActivityResult};
pub use notes::{Note, NoteAttachment, NoteDownload, NoteDraft, NoteService};
pub use search::{
    fetch_accounts, fetch_contacts, regarding_options, search_records, NamedRecord,
    RegardingOptions, SearchHit,
};
pub use service::ActivityService;
pub use types::{
    Activity, ActivityDraft, ActivityPage, ActivityPatch, ActivityQuery, OwnerRef, RegardingRef,
};
