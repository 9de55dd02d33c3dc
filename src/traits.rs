use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use url::Url;

use crate::config::{CopyConfig, InviteConfig, WatchConfig};
use crate::error::Error;
use crate::event::CalendarEvent;
use crate::patch::EventPatch;

/// The half-open time range an event listing is restricted to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window starting at `now` and extending `lookahead` into the future
    pub fn ahead_of(now: DateTime<Utc>, lookahead: Duration) -> Self {
        Self {
            start: now,
            end: now + lookahead,
        }
    }
}

/// A freshly registered push-notification channel, as the provider returns it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub channel_id: String,
    pub token: String,
    /// Channel expiry, in milliseconds since the Unix epoch
    pub expiration_ms: i64,
}

/// The calendar provider API, reduced to the calls the engine performs.
///
/// Implementations own protocol details, authentication and pagination. The durable
/// execution substrate around the engine owns per-call timeouts and retries: these
/// methods are expected to fail fast and honestly.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Returns the calendar's events within `window`.
    /// Implementations must not return cancelled events.
    async fn list_events(
        &self,
        calendar_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<CalendarEvent>, Error>;

    /// Returns one event by id
    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<CalendarEvent, Error>;

    /// Inserts a new event and returns it as the provider stored it
    async fn create_event(
        &self,
        calendar_id: &str,
        event: CalendarEvent,
    ) -> Result<CalendarEvent, Error>;

    /// Applies a partial update to one event and returns the updated event
    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: EventPatch,
    ) -> Result<CalendarEvent, Error>;

    /// Permanently removes one event
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), Error>;

    /// Registers a push-notification channel for the calendar, delivered to `address`
    async fn create_subscription(
        &self,
        calendar_id: &str,
        address: &Url,
    ) -> Result<Subscription, Error>;
}

/// Read access to the mirroring and invite rules, and CRUD on the watch bookkeeping
/// rows. Copy and invite rules are administered elsewhere; the engine only reads them.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Every configured mirroring rule
    async fn copy_configs(&self) -> Result<Vec<CopyConfig>, Error>;

    /// The mirroring rules whose source is `calendar_id`
    async fn copy_configs_for_source(&self, calendar_id: &str) -> Result<Vec<CopyConfig>, Error>;

    /// Every configured guest rule
    async fn invite_configs(&self) -> Result<Vec<InviteConfig>, Error>;

    /// The guest rules that apply to `calendar_id`
    async fn invite_configs_for_calendar(
        &self,
        calendar_id: &str,
    ) -> Result<Vec<InviteConfig>, Error>;

    /// Every watch bookkeeping row, live or not
    async fn watch_configs(&self) -> Result<Vec<WatchConfig>, Error>;

    /// The watch row owning `channel_id`, if any
    async fn watch_config_by_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<WatchConfig>, Error>;

    /// Persists a new watch row and returns it with its assigned id.
    /// `expiration` is always set: a subscription without one is not worth recording.
    async fn create_watch_config(
        &self,
        calendar_id: &str,
        channel_id: &str,
        token: &str,
        expiration: DateTime<Utc>,
    ) -> Result<WatchConfig, Error>;

    /// Removes one watch row. The provider-side channel is left alone.
    async fn delete_watch_config(&self, id: i64) -> Result<(), Error>;
}
