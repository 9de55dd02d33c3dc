//! In-memory mock collaborators and world-building helpers shared by the
//! integration tests.
//!
//! `MockClient` mocks the calendar provider, `MockStore` the configuration store.
//! Both record every call they receive, so tests can assert on write traffic (e.g.
//! "the second run performed zero writes"), and both can be told to fail on purpose
//! through their `*Behaviour` structs: set `(m, n)` for a given operation so that it
//! succeeds `m` times and then fails `n` times.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use url::Url;

use calendar_mirror::config::{CopyConfig, InviteConfig, WatchConfig};
use calendar_mirror::error::Error;
use calendar_mirror::event::{CalendarEvent, EventDateTime};
use calendar_mirror::patch::{build_copy, DateTimePatch, EventPatch};
use calendar_mirror::settings::Settings;
use calendar_mirror::traits::{CalendarClient, ConfigStore, Subscription, TimeWindow};
use calendar_mirror::Reconciler;

/// Every call the mock provider received, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCall {
    List(String),
    Get(String, String),
    Create(String),
    Patch(String, String),
    Delete(String, String),
    Subscribe(String),
}

impl ClientCall {
    pub fn is_write(&self) -> bool {
        !matches!(self, ClientCall::List(_) | ClientCall::Get(_, _))
    }
}

fn decrement(behaviour: &mut (u32, u32), descr: &str) -> Result<(), Error> {
    if behaviour.0 > 0 {
        behaviour.0 -= 1;
        return Ok(());
    }
    if behaviour.1 > 0 {
        behaviour.1 -= 1;
        return Err(Error::Provider(format!(
            "{} failure requested by the mock behaviour",
            descr
        )));
    }
    Ok(())
}

fn decrement_store(behaviour: &mut (u32, u32), descr: &str) -> Result<(), Error> {
    decrement(behaviour, descr).map_err(|_| {
        Error::Store(format!("{} failure requested by the mock behaviour", descr))
    })
}

/// How the mock provider should misbehave during a test
#[derive(Default, Debug)]
pub struct ClientBehaviour {
    pub list_events_behaviour: (u32, u32),
    pub get_event_behaviour: (u32, u32),
    pub create_event_behaviour: (u32, u32),
    pub patch_event_behaviour: (u32, u32),
    pub delete_event_behaviour: (u32, u32),
    pub create_subscription_behaviour: (u32, u32),
}

/// An in-memory calendar provider
#[derive(Default)]
pub struct MockClient {
    calendars: Mutex<HashMap<String, Vec<CalendarEvent>>>,
    calls: Mutex<Vec<ClientCall>>,
    behaviour: Mutex<ClientBehaviour>,
    generated_ids: Mutex<u32>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behaviour(&self, behaviour: ClientBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    /// Registers an empty calendar
    pub fn add_calendar(&self, calendar_id: &str) {
        self.calendars
            .lock()
            .unwrap()
            .entry(calendar_id.to_string())
            .or_default();
    }

    /// Seeds one event, registering the calendar if needed
    pub fn insert_event(&self, calendar_id: &str, event: CalendarEvent) {
        self.calendars
            .lock()
            .unwrap()
            .entry(calendar_id.to_string())
            .or_default()
            .push(event);
    }

    /// The current contents of one calendar
    pub fn events(&self, calendar_id: &str) -> Vec<CalendarEvent> {
        self.calendars
            .lock()
            .unwrap()
            .get(calendar_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find_event(&self, calendar_id: &str, event_id: &str) -> Option<CalendarEvent> {
        self.events(calendar_id)
            .into_iter()
            .find(|event| event.id == event_id)
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The calls that would have written something on the provider
    pub fn writes(&self) -> Vec<ClientCall> {
        self.calls().into_iter().filter(ClientCall::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: ClientCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CalendarClient for MockClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        _window: TimeWindow,
    ) -> Result<Vec<CalendarEvent>, Error> {
        self.record(ClientCall::List(calendar_id.to_string()));
        decrement(
            &mut self.behaviour.lock().unwrap().list_events_behaviour,
            "list_events",
        )?;

        let calendars = self.calendars.lock().unwrap();
        let events = calendars
            .get(calendar_id)
            .ok_or_else(|| Error::Provider(format!("unknown calendar {}", calendar_id)))?;
        // the mock worlds only ever contain upcoming events, so the window is not
        // re-checked here; cancelled events are excluded as the contract requires
        Ok(events.iter().filter(|e| !e.is_cancelled()).cloned().collect())
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<CalendarEvent, Error> {
        self.record(ClientCall::Get(calendar_id.to_string(), event_id.to_string()));
        decrement(
            &mut self.behaviour.lock().unwrap().get_event_behaviour,
            "get_event",
        )?;

        self.find_event(calendar_id, event_id)
            .ok_or_else(|| Error::Provider(format!("no event {} in {}", event_id, calendar_id)))
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        event: CalendarEvent,
    ) -> Result<CalendarEvent, Error> {
        self.record(ClientCall::Create(calendar_id.to_string()));
        decrement(
            &mut self.behaviour.lock().unwrap().create_event_behaviour,
            "create_event",
        )?;

        let mut event = event;
        if event.id.is_empty() {
            let mut generated = self.generated_ids.lock().unwrap();
            *generated += 1;
            event.id = format!("generated-{}", generated);
        }

        let mut calendars = self.calendars.lock().unwrap();
        let events = calendars
            .get_mut(calendar_id)
            .ok_or_else(|| Error::Provider(format!("unknown calendar {}", calendar_id)))?;
        events.push(event.clone());
        Ok(event)
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: EventPatch,
    ) -> Result<CalendarEvent, Error> {
        self.record(ClientCall::Patch(calendar_id.to_string(), event_id.to_string()));
        decrement(
            &mut self.behaviour.lock().unwrap().patch_event_behaviour,
            "patch_event",
        )?;

        let mut calendars = self.calendars.lock().unwrap();
        let events = calendars
            .get_mut(calendar_id)
            .ok_or_else(|| Error::Provider(format!("unknown calendar {}", calendar_id)))?;
        let event = events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| Error::Provider(format!("no event {} in {}", event_id, calendar_id)))?;

        apply_patch(event, &patch);
        Ok(event.clone())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), Error> {
        self.record(ClientCall::Delete(calendar_id.to_string(), event_id.to_string()));
        decrement(
            &mut self.behaviour.lock().unwrap().delete_event_behaviour,
            "delete_event",
        )?;

        let mut calendars = self.calendars.lock().unwrap();
        let events = calendars
            .get_mut(calendar_id)
            .ok_or_else(|| Error::Provider(format!("unknown calendar {}", calendar_id)))?;
        let before = events.len();
        events.retain(|event| event.id != event_id);
        if events.len() == before {
            return Err(Error::Provider(format!(
                "no event {} in {}",
                event_id, calendar_id
            )));
        }
        Ok(())
    }

    async fn create_subscription(
        &self,
        calendar_id: &str,
        _address: &Url,
    ) -> Result<Subscription, Error> {
        self.record(ClientCall::Subscribe(calendar_id.to_string()));
        decrement(
            &mut self.behaviour.lock().unwrap().create_subscription_behaviour,
            "create_subscription",
        )?;

        Ok(Subscription {
            channel_id: uuid::Uuid::new_v4().to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            expiration_ms: (Utc::now() + Duration::days(7)).timestamp_millis(),
        })
    }
}

/// Mirror of what the provider does with a partial update
fn apply_patch(event: &mut CalendarEvent, patch: &EventPatch) {
    if let Some(value) = &patch.event_type {
        event.event_type = value.clone();
    }
    if let Some(value) = &patch.location {
        event.location = value.clone();
    }
    if let Some(value) = &patch.status {
        event.status = value.clone();
    }
    if let Some(value) = &patch.summary {
        event.summary = value.clone();
    }
    if let Some(value) = &patch.description {
        event.description = value.clone();
    }
    if let Some(value) = &patch.recurrence {
        event.recurrence = value.clone();
    }
    if let Some(value) = &patch.start {
        apply_boundary(&mut event.start, value);
    }
    if let Some(value) = &patch.end {
        apply_boundary(&mut event.end, value);
    }
    if let Some(value) = &patch.attendees {
        event.attendees = value.clone();
    }
}

fn apply_boundary(boundary: &mut Option<EventDateTime>, patch: &DateTimePatch) {
    let target = boundary.get_or_insert_with(EventDateTime::default);
    if let Some(date) = &patch.date {
        target.date = date.clone();
    }
    if let Some(date_time) = &patch.date_time {
        target.date_time = date_time.clone();
    }
    if let Some(time_zone) = &patch.time_zone {
        target.time_zone = time_zone.clone();
    }
}

/// How the mock store should misbehave during a test
#[derive(Default, Debug)]
pub struct StoreBehaviour {
    pub copy_configs_behaviour: (u32, u32),
    pub invite_configs_behaviour: (u32, u32),
    pub watch_configs_behaviour: (u32, u32),
    pub create_watch_behaviour: (u32, u32),
    pub delete_watch_behaviour: (u32, u32),
}

/// An in-memory configuration store
#[derive(Default)]
pub struct MockStore {
    copies: Mutex<Vec<CopyConfig>>,
    invites: Mutex<Vec<InviteConfig>>,
    watches: Mutex<Vec<WatchConfig>>,
    next_id: Mutex<i64>,
    behaviour: Mutex<StoreBehaviour>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behaviour(&self, behaviour: StoreBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    fn next_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    pub fn add_copy(&self, source_calendar_id: &str, destination_calendar_id: &str) {
        let config = CopyConfig {
            id: self.next_id(),
            source_calendar_id: source_calendar_id.to_string(),
            destination_calendar_id: destination_calendar_id.to_string(),
        };
        self.copies.lock().unwrap().push(config);
    }

    pub fn add_invite(&self, calendar_id: &str, email_address: &str) {
        let config = InviteConfig {
            id: self.next_id(),
            calendar_id: calendar_id.to_string(),
            email_address: email_address.to_string(),
        };
        self.invites.lock().unwrap().push(config);
    }

    pub fn add_watch(
        &self,
        calendar_id: &str,
        channel_id: &str,
        token: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> i64 {
        let id = self.next_id();
        self.watches.lock().unwrap().push(WatchConfig {
            id,
            calendar_id: calendar_id.to_string(),
            channel_id: channel_id.to_string(),
            token: token.to_string(),
            expiration,
        });
        id
    }

    pub fn watch_rows(&self) -> Vec<WatchConfig> {
        self.watches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for MockStore {
    async fn copy_configs(&self) -> Result<Vec<CopyConfig>, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().copy_configs_behaviour,
            "copy_configs",
        )?;
        Ok(self.copies.lock().unwrap().clone())
    }

    async fn copy_configs_for_source(&self, calendar_id: &str) -> Result<Vec<CopyConfig>, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().copy_configs_behaviour,
            "copy_configs_for_source",
        )?;
        Ok(self
            .copies
            .lock()
            .unwrap()
            .iter()
            .filter(|config| config.source_calendar_id == calendar_id)
            .cloned()
            .collect())
    }

    async fn invite_configs(&self) -> Result<Vec<InviteConfig>, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().invite_configs_behaviour,
            "invite_configs",
        )?;
        Ok(self.invites.lock().unwrap().clone())
    }

    async fn invite_configs_for_calendar(
        &self,
        calendar_id: &str,
    ) -> Result<Vec<InviteConfig>, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().invite_configs_behaviour,
            "invite_configs_for_calendar",
        )?;
        Ok(self
            .invites
            .lock()
            .unwrap()
            .iter()
            .filter(|config| config.calendar_id == calendar_id)
            .cloned()
            .collect())
    }

    async fn watch_configs(&self) -> Result<Vec<WatchConfig>, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().watch_configs_behaviour,
            "watch_configs",
        )?;
        Ok(self.watches.lock().unwrap().clone())
    }

    async fn watch_config_by_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<WatchConfig>, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().watch_configs_behaviour,
            "watch_config_by_channel",
        )?;
        Ok(self
            .watches
            .lock()
            .unwrap()
            .iter()
            .find(|watch| watch.channel_id == channel_id)
            .cloned())
    }

    async fn create_watch_config(
        &self,
        calendar_id: &str,
        channel_id: &str,
        token: &str,
        expiration: DateTime<Utc>,
    ) -> Result<WatchConfig, Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().create_watch_behaviour,
            "create_watch_config",
        )?;
        let watch = WatchConfig {
            id: self.next_id(),
            calendar_id: calendar_id.to_string(),
            channel_id: channel_id.to_string(),
            token: token.to_string(),
            expiration: Some(expiration),
        };
        self.watches.lock().unwrap().push(watch.clone());
        Ok(watch)
    }

    async fn delete_watch_config(&self, id: i64) -> Result<(), Error> {
        decrement_store(
            &mut self.behaviour.lock().unwrap().delete_watch_behaviour,
            "delete_watch_config",
        )?;
        self.watches.lock().unwrap().retain(|watch| watch.id != id);
        Ok(())
    }
}

/// A populated, non-recurring event
pub fn event(id: &str, summary: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        kind: "calendar#event".to_string(),
        status: "confirmed".to_string(),
        summary: summary.to_string(),
        event_type: "default".to_string(),
        start: Some(boundary("2024-05-02T12:00:00Z")),
        end: Some(boundary("2024-05-02T13:00:00Z")),
        ..CalendarEvent::default()
    }
}

pub fn boundary(date_time: &str) -> EventDateTime {
    EventDateTime {
        date: String::new(),
        date_time: date_time.to_string(),
        time_zone: "UTC".to_string(),
    }
}

/// An already-applied copy of `source`, as a previous pass would have left it
pub fn copied(source_calendar_id: &str, source: &CalendarEvent, copy_id: &str) -> CalendarEvent {
    let mut copy = build_copy(source_calendar_id, source);
    copy.id = copy_id.to_string();
    copy
}

pub fn settings() -> Settings {
    Settings::new(Url::parse("https://mirror.example.net/webhook").unwrap())
}

pub fn reconciler(client: MockClient, store: MockStore) -> Reconciler<MockClient, MockStore> {
    Reconciler::new(client, store, settings())
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}
