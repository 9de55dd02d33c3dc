//! Diffing events and building the minimal patches that reconcile them
//!
//! This is the leaf utility every pass leans on. The diff walks explicit tables of
//! (wire name, getter, patch setter) tuples, one per record type, so the set of
//! reconciled fields is enumerable and visible in one place.
//!
//! The cardinal rule lives in [`build_patch`]: if nothing differs there is no patch,
//! and an absent patch means no write reaches the provider. Re-running a pass over an
//! unchanged world issues zero write calls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::{
    Attendee, CalendarEvent, EventDateTime, ExtendedProperties, SOURCE_CALENDAR_ID,
    SOURCE_CALENDAR_ITEM_ID,
};

/// A partial event: only the fields that must change on the destination copy.
/// `None` fields are left untouched by the provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTimePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTimePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
}

impl EventPatch {
    /// An empty patch must never be sent to the provider
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The patch the invite pass applies: the full attendee list with the missing
    /// guest already appended
    pub fn with_attendees(attendees: Vec<Attendee>) -> Self {
        Self {
            attendees: Some(attendees),
            ..Self::default()
        }
    }
}

/// A partial [`EventDateTime`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DateTimePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl DateTimePatch {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The whole sub-record, for destinations that have no boundary to merge into
    fn full(from: &EventDateTime) -> Self {
        Self {
            date: Some(from.date.clone()),
            date_time: Some(from.date_time.clone()),
            time_zone: Some(from.time_zone.clone()),
        }
    }
}

/// One diffable scalar field of an event: its wire name, where to read it, and where
/// to write it on the patch
struct ScalarField {
    name: &'static str,
    get: fn(&CalendarEvent) -> &str,
    set: fn(&mut EventPatch, String),
}

const SCALAR_FIELDS: [ScalarField; 5] = [
    ScalarField {
        name: "eventType",
        get: |event| event.event_type.as_str(),
        set: |patch, value| patch.event_type = Some(value),
    },
    ScalarField {
        name: "location",
        get: |event| event.location.as_str(),
        set: |patch, value| patch.location = Some(value),
    },
    ScalarField {
        name: "status",
        get: |event| event.status.as_str(),
        set: |patch, value| patch.status = Some(value),
    },
    ScalarField {
        name: "summary",
        get: |event| event.summary.as_str(),
        set: |patch, value| patch.summary = Some(value),
    },
    ScalarField {
        name: "description",
        get: |event| event.description.as_str(),
        set: |patch, value| patch.description = Some(value),
    },
];

/// Same scheme for the sub-fields of a date/time boundary
struct DateTimeField {
    name: &'static str,
    get: fn(&EventDateTime) -> &str,
    set: fn(&mut DateTimePatch, String),
}

const DATE_TIME_FIELDS: [DateTimeField; 3] = [
    DateTimeField {
        name: "date",
        get: |boundary| boundary.date.as_str(),
        set: |patch, value| patch.date = Some(value),
    },
    DateTimeField {
        name: "dateTime",
        get: |boundary| boundary.date_time.as_str(),
        set: |patch, value| patch.date_time = Some(value),
    },
    DateTimeField {
        name: "timeZone",
        get: |boundary| boundary.time_zone.as_str(),
        set: |patch, value| patch.time_zone = Some(value),
    },
];

/// Computes the patch that brings `to` (the currently-applied copy) in line with
/// `from` (the source of truth).
///
/// Both events are normalized (see [`CalendarEvent::cleanup`]) before comparison.
/// Scalar fields are copied verbatim when they differ; the recurrence list is copied
/// wholesale when its length or any element differs; start/end recurse over their
/// sub-fields. Returns `None` when every compared field already matches.
pub fn build_patch(from: &CalendarEvent, to: &CalendarEvent) -> Option<EventPatch> {
    let mut from = from.clone();
    let mut to = to.clone();
    from.cleanup();
    to.cleanup();

    let mut patch = EventPatch::default();

    for field in &SCALAR_FIELDS {
        let source = (field.get)(&from);
        let destination = (field.get)(&to);
        if source != destination {
            log::debug!(
                "event {}: {} differs (source {:?}, destination {:?})",
                to.id,
                field.name,
                source,
                destination
            );
            (field.set)(&mut patch, source.to_string());
        }
    }

    if lists_differ(&from.recurrence, &to.recurrence) {
        log::debug!("event {}: recurrence differs", to.id);
        patch.recurrence = Some(from.recurrence.clone());
    }

    patch.start = diff_date_time("start", from.start.as_ref(), to.start.as_ref());
    patch.end = diff_date_time("end", from.end.as_ref(), to.end.as_ref());

    if patch.is_empty() {
        None
    } else {
        Some(patch)
    }
}

fn lists_differ(from: &[String], to: &[String]) -> bool {
    from.len() != to.len() || from.iter().zip(to).any(|(f, t)| f != t)
}

/// An absent source boundary contributes nothing; a source boundary with no
/// destination counterpart is copied whole; otherwise only the differing sub-fields
/// are included.
fn diff_date_time(
    name: &str,
    from: Option<&EventDateTime>,
    to: Option<&EventDateTime>,
) -> Option<DateTimePatch> {
    let from = from?;
    let to = match to {
        Some(to) => to,
        None => return Some(DateTimePatch::full(from)),
    };

    let mut patch = DateTimePatch::default();
    for field in &DATE_TIME_FIELDS {
        let source = (field.get)(from);
        let destination = (field.get)(to);
        if source != destination {
            log::debug!(
                "{}.{} differs (source {:?}, destination {:?})",
                name,
                field.name,
                source,
                destination
            );
            (field.set)(&mut patch, source.to_string());
        }
    }

    if patch.is_empty() {
        None
    } else {
        Some(patch)
    }
}

/// Builds the fresh destination record for a source event that has no copy yet.
///
/// Only the safe-to-copy fields are carried over (description, end, event type, kind,
/// location, start, status, summary), plus the two correlation tags. Destination-only
/// bookkeeping fields (the id, the attendee list) are never copied.
pub fn build_copy(source_calendar_id: &str, source: &CalendarEvent) -> CalendarEvent {
    let mut private = HashMap::new();
    private.insert(SOURCE_CALENDAR_ID.to_string(), source_calendar_id.to_string());
    private.insert(SOURCE_CALENDAR_ITEM_ID.to_string(), source.id.clone());

    let mut event = CalendarEvent {
        description: source.description.clone(),
        end: source.end.clone(),
        event_type: source.event_type.clone(),
        kind: source.kind.clone(),
        location: source.location.clone(),
        start: source.start.clone(),
        status: source.status.clone(),
        summary: source.summary.clone(),
        extended_properties: Some(ExtendedProperties { private }),
        ..CalendarEvent::default()
    };
    event.cleanup();
    event
}
