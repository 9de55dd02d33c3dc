//! Calendar events, as the provider hands them to us
//!
//! Events are value-like records: the provider owns them, we read them, diff them and
//! write patches back. The engine never keeps one alive beyond a single pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Private extended-property key naming the calendar a copied event originates from
pub const SOURCE_CALENDAR_ID: &str = "source-calendar-id";
/// Private extended-property key naming the event a copied event originates from
pub const SOURCE_CALENDAR_ITEM_ID: &str = "source-calendar-item-id";

/// The status string the provider uses for cancelled events
pub const STATUS_CANCELLED: &str = "cancelled";

/// An event attendee: an email address plus its provider-side flags
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attendee {
    pub email: String,
    pub display_name: String,
    pub optional: bool,
    pub response_status: String,
    pub additional_guests: i64,
}

impl Attendee {
    /// The record the invite pass appends: the bare address with one extra-guest slot
    pub fn guest(email: &str) -> Self {
        Self {
            email: email.to_string(),
            additional_guests: 1,
            ..Self::default()
        }
    }
}

/// The date/time boundary of an event.
///
/// The provider populates at most one of `date` (all-day events) and `date_time`;
/// absent sub-fields are empty strings, as on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDateTime {
    pub date: String,
    pub date_time: String,
    pub time_zone: String,
}

/// The private extended-property map the copy pass uses as its tagging mechanism
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedProperties {
    pub private: HashMap<String, String>,
}

/// A calendar event, owned by the external provider
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarEvent {
    pub id: String,
    pub kind: String,
    pub status: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub event_type: String,
    pub start: Option<EventDateTime>,
    pub end: Option<EventDateTime>,
    pub recurrence: Vec<String>,
    pub attendees: Vec<Attendee>,
    pub extended_properties: Option<ExtendedProperties>,
}

impl CalendarEvent {
    /// Returns a private extended property, or `""` when the event carries no such tag
    pub fn private_property(&self, key: &str) -> &str {
        self.extended_properties
            .as_ref()
            .and_then(|props| props.private.get(key))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The calendar this event was copied from (`""` for untagged events)
    pub fn source_calendar_id(&self) -> &str {
        self.private_property(SOURCE_CALENDAR_ID)
    }

    /// The correlation key joining a copy back to its source event (`""` for untagged events)
    pub fn source_item_id(&self) -> &str {
        self.private_property(SOURCE_CALENDAR_ITEM_ID)
    }

    /// Whether both correlation tags match the given source calendar and source event
    pub fn is_copy_of(&self, source_calendar_id: &str, source_item_id: &str) -> bool {
        self.source_calendar_id() == source_calendar_id && self.source_item_id() == source_item_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == STATUS_CANCELLED
    }

    /// Normalization applied before any comparison and to every freshly built copy:
    /// a blank summary becomes `"Busy"`, a blank event type becomes `"default"`.
    pub fn cleanup(&mut self) {
        if self.summary.is_empty() {
            self.summary = "Busy".to_string();
        }
        if self.event_type.is_empty() {
            self.event_type = "default".to_string();
        }
    }
}
