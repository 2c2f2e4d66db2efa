//! Static state/status metadata for every supported activity type.
//!
//! Dynamics models activity lifecycle as a `statecode` (0 Open,
//! 1 Completed, 2 Canceled, 3 Scheduled) plus a type-specific
//! `statuscode`. The table below lists, per activity type and state,
//! the status codes that state accepts; the first entry of each list
//! is the default written when the caller picks only a state.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Status codes valid for one state, with display labels. The first
/// entry is the default for that state.
type StateStatuses = &'static [(i32, &'static [(i32, &'static str)])];

const GENERIC: StateStatuses = &[
    (0, &[(1, "Open")]),
    (1, &[(2, "Completed")]),
    (2, &[(3, "Canceled")]),
];

const TASK: StateStatuses = &[
    (
        0,
        &[
            (2, "Not Started"),
            (3, "In Progress"),
            (4, "Waiting on someone else"),
            (7, "Deferred"),
        ],
    ),
    (1, &[(5, "Completed")]),
    (2, &[(6, "Canceled")]),
];

const PHONE_CALL: StateStatuses = &[
    (0, &[(1, "Open")]),
    (1, &[(2, "Made"), (4, "Received")]),
    (2, &[(3, "Canceled")]),
];

const APPOINTMENT: StateStatuses = &[
    (0, &[(1, "Free"), (2, "Tentative")]),
    (1, &[(3, "Completed")]),
    (2, &[(4, "Canceled")]),
    (3, &[(5, "Busy"), (6, "Out of Office")]),
];

const EMAIL: StateStatuses = &[
    (0, &[(1, "Draft"), (8, "Failed")]),
    (
        1,
        &[
            (2, "Completed"),
            (3, "Sent"),
            (4, "Received"),
            (6, "Pending Send"),
            (7, "Sending"),
        ],
    ),
    (2, &[(5, "Canceled")]),
];

const FAX: StateStatuses = &[
    (0, &[(1, "Open")]),
    (1, &[(2, "Completed"), (3, "Sent"), (4, "Received")]),
    (2, &[(5, "Canceled")]),
];

const LETTER: StateStatuses = &[
    (0, &[(1, "Open"), (2, "Draft")]),
    (1, &[(3, "Received"), (4, "Sent")]),
    (2, &[(5, "Canceled")]),
];

const SERVICE_APPOINTMENT: StateStatuses = &[
    (0, &[(1, "Requested"), (2, "Tentative")]),
    (1, &[(8, "Completed")]),
    (2, &[(9, "Canceled"), (10, "No Show")]),
    (
        3,
        &[
            (3, "Pending"),
            (4, "Reserved"),
            (6, "In Progress"),
            (7, "Arrived"),
        ],
    ),
];

const CAMPAIGN_ACTIVITY: StateStatuses = &[
    (0, &[(1, "Proposed"), (4, "Pending")]),
    (1, &[(6, "Completed")]),
    (2, &[(3, "Canceled")]),
];

const BULK_OPERATION: StateStatuses = &[
    (0, &[(1, "Pending"), (2, "In Progress")]),
    (1, &[(3, "Completed")]),
    (2, &[(4, "Canceled")]),
];

/// Lifecycle table keyed by `activitytypecode` logical name.
static STATUS_TABLE: Lazy<HashMap<&'static str, StateStatuses>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, StateStatuses> = HashMap::new();
    table.insert("task", TASK);
    table.insert("phonecall", PHONE_CALL);
    table.insert("appointment", APPOINTMENT);
    table.insert("recurringappointmentmaster", APPOINTMENT);
    table.insert("email", EMAIL);
    table.insert("fax", FAX);
    table.insert("letter", LETTER);
    table.insert("serviceappointment", SERVICE_APPOINTMENT);
    table.insert("campaignactivity", CAMPAIGN_ACTIVITY);
    table.insert("bulkoperation", BULK_OPERATION);
    table.insert("campaignresponse", GENERIC);
    table.insert("incidentresolution", GENERIC);
    table.insert("opportunityclose", GENERIC);
    table.insert("orderclose", GENERIC);
    table.insert("quoteclose", GENERIC);
    table.insert("socialactivity", GENERIC);
    // Custom activities share the stock three-status lifecycle.
    for kind in [
        "new_sms",
        "new_takhfif",
        "new_morakhasi",
        "new_pardakht",
        "new_daryaft",
        "new_peigirihesab",
        "new_mosaedeh",
        "new_dissatisfaction",
        "new_pilotfollowing",
        "new_carditinception",
        "new_downtrendcustomer",
        "new_returncustomer",
        "new_urgentfollowup",
        "new_testactivity",
        "new_receiptpaymentapproval",
        "new_customerlostfollowup",
        "new_assembly",
    ] {
        table.insert(kind, GENERIC);
    }
    table
});

/// Collection (entity set) names for activity types whose plural is not
/// just the logical name plus `s`.
static IRREGULAR_SETS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("fax", "faxes"),
        ("campaignactivity", "campaignactivities"),
        ("socialactivity", "socialactivities"),
        ("new_sms", "new_smses"),
        ("new_assembly", "new_assemblies"),
    ])
});

/// Status defaults used when a type is missing from the table entirely.
fn fallback_status(state: i32) -> i32 {
    match state {
        1 => 5,
        2 => 6,
        _ => 2,
    }
}

/// Clamps a requested state to the writable range. Scheduled (3) is
/// read-only and never written back.
#[must_use]
pub fn clamp_state(state: i32) -> i32 {
    state.clamp(0, 2)
}

/// Display label for a `statecode` value.
#[must_use]
pub fn state_label(state: i32) -> &'static str {
    match state {
        0 => "Open",
        1 => "Completed",
        2 => "Canceled",
        3 => "Scheduled",
        _ => "Unknown",
    }
}

/// Status codes the given activity type accepts in the given state.
/// Empty when the type or state is unknown.
#[must_use]
pub fn statuses_for(kind: &str, state: i32) -> &'static [(i32, &'static str)] {
    STATUS_TABLE
        .get(kind)
        .and_then(|states| {
            states
                .iter()
                .find(|(declared, _)| *declared == state)
                .map(|(_, statuses)| *statuses)
        })
        .unwrap_or(&[])
}

/// Resolves the status code written for a state transition: the first
/// status declared for the (clamped) state, or the universal fallback
/// when the type has no table entry.
#[must_use]
pub fn resolve_status(kind: &str, state: i32) -> i32 {
    let state = clamp_state(state);
    match statuses_for(kind, state).first() {
        Some((code, _)) => *code,
        None => fallback_status(state),
    }
}

/// Display label for a status code, searched across all states of the
/// given type.
#[must_use]
pub fn status_label(kind: &str, status: i32) -> Option<&'static str> {
    STATUS_TABLE.get(kind).and_then(|states| {
        states.iter().flat_map(|(_, statuses)| statuses.iter()).find_map(
            |(code, label)| (*code == status).then_some(*label),
        )
    })
}

/// Collection name a given activity type is created and patched
/// through, e.g. `task` ⇒ `tasks`, `fax` ⇒ `faxes`.
#[must_use]
pub fn entity_set(kind: &str) -> String {
    match IRREGULAR_SETS.get(kind) {
        Some(set) => (*set).to_string(),
        None => format!("{kind}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_states() {
        assert_eq!(clamp_state(-1), 0);
        assert_eq!(clamp_state(0), 0);
        assert_eq!(clamp_state(2), 2);
        assert_eq!(clamp_state(3), 2);
        assert_eq!(clamp_state(99), 2);
    }

    #[test]
    fn resolves_first_declared_status() {
        assert_eq!(resolve_status("task", 0), 2);
        assert_eq!(resolve_status("task", 1), 5);
        assert_eq!(resolve_status("task", 2), 6);
        assert_eq!(resolve_status("phonecall", 1), 2);
        assert_eq!(resolve_status("serviceappointment", 1), 8);
        assert_eq!(resolve_status("email", 2), 5);
    }

    #[test]
    fn unknown_types_use_universal_fallback() {
        assert_eq!(resolve_status("new_unmapped_thing", 0), 2);
        assert_eq!(resolve_status("new_unmapped_thing", 1), 5);
        assert_eq!(resolve_status("new_unmapped_thing", 2), 6);
    }

    #[test]
    fn clamp_applies_before_resolution() {
        // Scheduled collapses onto Canceled for writes.
        assert_eq!(resolve_status("appointment", 3), 4);
        assert_eq!(resolve_status("task", -5), 2);
    }

    #[test]
    fn status_labels_search_every_state() {
        assert_eq!(status_label("task", 7), Some("Deferred"));
        assert_eq!(status_label("phonecall", 4), Some("Received"));
        assert_eq!(status_label("email", 6), Some("Pending Send"));
        assert_eq!(status_label("task", 42), None);
        assert_eq!(status_label("unknown", 2), None);
    }

    #[test]
    fn state_labels() {
        assert_eq!(state_label(0), "Open");
        assert_eq!(state_label(3), "Scheduled");
        assert_eq!(state_label(9), "Unknown");
    }

    #[test]
    fn entity_sets_handle_irregular_plurals() {
        assert_eq!(entity_set("task"), "tasks");
        assert_eq!(entity_set("fax"), "faxes");
        assert_eq!(entity_set("campaignactivity"), "campaignactivities");
        assert_eq!(entity_set("new_sms"), "new_smses");
        assert_eq!(entity_set("new_pardakht"), "new_pardakhts");
    }

    #[test]
    fn custom_types_share_stock_lifecycle() {
        assert_eq!(resolve_status("new_takhfif", 1), 2);
        assert_eq!(status_label("new_morakhasi", 3), Some("Canceled"));
    }
}
