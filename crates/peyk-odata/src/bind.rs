//! Relationship bind references.
//!
//! Writes point at related records with `<field>@odata.bind` keys whose
//! value is `/<entitySet>(<guid>)`. The wire string is produced only
//! here, at the payload boundary; call sites carry the tagged structure.
//! The remote rejects a present-but-empty bind, so empty references are
//! stripped before submission.

use serde_json::{Map, Value};

/// Suffix of a relationship bind key.
pub const BIND_SUFFIX: &str = "@odata.bind";

/// A write-time relationship pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRef {
    /// Navigation property on the record being written.
    pub field: String,
    /// Plural entity-set name of the target.
    pub entity_set: String,
    /// Target record id; empty means "no reference".
    pub target_id: String,
}

impl BindRef {
    /// Creates a bind reference.
    pub fn new(
        field: impl Into<String>,
        entity_set: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            entity_set: entity_set.into(),
            target_id: target_id.into(),
        }
    }

    /// Wire key, e.g. `ownerid@odata.bind`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{BIND_SUFFIX}", self.field)
    }

    /// Wire value, e.g. `/systemusers(9f8e…)`.
    #[must_use]
    pub fn value(&self) -> String {
        format!("/{}({})", self.entity_set, self.target_id)
    }

    /// True when the reference points at nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target_id.trim().is_empty()
    }

    /// Inserts the bind into a payload map, skipping empty references.
    pub fn apply(&self, payload: &mut Map<String, Value>) {
        if !self.is_empty() {
            payload.insert(self.key(), Value::String(self.value()));
        }
    }
}

/// Removes bind keys whose value is empty or null.
///
/// Guards payloads assembled from caller-supplied field maps, where an
/// empty bind may arrive pre-serialized.
pub fn strip_empty_binds(payload: &mut Map<String, Value>) {
    payload.retain(|key, value| {
        if !key.ends_with(BIND_SUFFIX) {
            return true;
        }
        match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_key_and_value() {
        let bind = BindRef::new("ownerid", "systemusers", "123e4567-e89b-12d3-a456-426614174000");
        assert_eq!(bind.key(), "ownerid@odata.bind");
        assert_eq!(
            bind.value(),
            "/systemusers(123e4567-e89b-12d3-a456-426614174000)"
        );
    }

    #[test]
    fn empty_bind_is_not_applied() {
        let mut payload = Map::new();
        BindRef::new("ownerid", "systemusers", "").apply(&mut payload);
        BindRef::new("regardingobjectid_account", "accounts", "abc").apply(&mut payload);
        assert!(!payload.contains_key("ownerid@odata.bind"));
        assert_eq!(
            payload["regardingobjectid_account@odata.bind"],
            json!("/accounts(abc)")
        );
    }

    #[test]
    fn strips_pre_serialized_empty_binds() {
        let mut payload = Map::new();
        payload.insert("subject".into(), json!("call back"));
        payload.insert("ownerid@odata.bind".into(), json!(""));
        payload.insert("regardingobjectid_account@odata.bind".into(), Value::Null);
        payload.insert("objectid_task@odata.bind".into(), json!("/tasks(1)"));

        strip_empty_binds(&mut payload);

        assert_eq!(payload.len(), 2);
        assert!(payload.contains_key("subject"));
        assert!(payload.contains_key("objectid_task@odata.bind"));
    }
}
