//! The stored configuration rows that drive the passes
//!
//! These are read from (and, for watches, written back to) the external store through
//! the [`ConfigStore`](crate::traits::ConfigStore) contract. They are plain values:
//! nothing here is cached between passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A one-directional mirroring rule: every upcoming event of `source_calendar_id`
/// must have a tagged copy on `destination_calendar_id`.
///
/// Several rules may share a source or a destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyConfig {
    pub id: i64,
    pub source_calendar_id: String,
    pub destination_calendar_id: String,
}

/// A guest rule: every upcoming, non-cancelled event of `calendar_id` must carry
/// `email_address` in its attendee list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteConfig {
    pub id: i64,
    pub calendar_id: String,
    pub email_address: String,
}

/// One push-notification subscription registered with the provider.
///
/// At most one live row may exist per calendar. Rows whose expiration is unset or in
/// the past are pruned by the watch pass; the provider-side channel is left to lapse
/// on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub id: i64,
    pub calendar_id: String,
    pub channel_id: String,
    pub token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl WatchConfig {
    /// Whether this subscription is still usable at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(expiration) => expiration > now,
            None => false,
        }
    }
}
