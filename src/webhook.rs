//! Turning provider push notifications into targeted reconciliation
//!
//! The ingress layer (out of scope here) acknowledges the provider immediately and
//! hands the notification fields to [`Reconciler::process_notification`], which
//! re-runs the copy and invite logic for just the one changed event instead of
//! sweeping whole calendars.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::WatchConfig;
use crate::error::Error;
use crate::patch;
use crate::reconcile::report::{ItemOperation, PassReport};
use crate::reconcile::Reconciler;
use crate::traits::{CalendarClient, ConfigStore};

/// Header carrying [`Notification::channel_id`]
pub const CHANNEL_ID_HEADER: &str = "X-Goog-Channel-ID";
/// Header carrying [`Notification::message_number`]
pub const MESSAGE_NUMBER_HEADER: &str = "X-Goog-Message-Number";
/// Header carrying [`Notification::resource_id`]
pub const RESOURCE_ID_HEADER: &str = "X-Goog-Resource-ID";
/// Header carrying [`Notification::resource_state`]
pub const RESOURCE_STATE_HEADER: &str = "X-Goog-Resource-State";
/// Header carrying [`Notification::resource_uri`]
pub const RESOURCE_URI_HEADER: &str = "X-Goog-Resource-URI";
/// Header carrying [`Notification::channel_token`]
pub const CHANNEL_TOKEN_HEADER: &str = "X-Goog-Channel-Token";

/// One push notification, as the provider delivers it through the webhook headers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub channel_id: String,
    pub message_number: String,
    pub resource_id: String,
    pub resource_state: String,
    pub resource_uri: String,
    pub channel_token: String,
}

/// What a push notification says happened to the watched resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceState {
    /// Channel handshake; not a data event
    Sync,
    /// The resource exists: it was created or modified
    Exists,
    /// The resource no longer exists
    NotExists,
    /// A state this engine does not know about
    Unknown(String),
}

impl ResourceState {
    pub fn parse(state: &str) -> Self {
        match state {
            "sync" => Self::Sync,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl<C, S> Reconciler<C, S>
where
    C: CalendarClient,
    S: ConfigStore,
{
    /// Processes one push notification.
    ///
    /// Handshake notifications are dropped. The channel is authenticated against the
    /// stored watch row: an unknown channel or a token mismatch is logged and
    /// swallowed, never surfaced as an error. `exists` re-runs the copy and invite
    /// logic for the one changed event; `not_exists` deletes its copies; anything
    /// else is logged and ignored. Fetching the collections this needs is fatal, as
    /// in the sweep passes.
    pub async fn process_notification(
        &self,
        notification: &Notification,
        report: &mut PassReport,
    ) -> Result<(), Error> {
        let state = ResourceState::parse(&notification.resource_state);
        if state == ResourceState::Sync {
            return Ok(());
        }

        let watch = match self
            .store()
            .watch_config_by_channel(&notification.channel_id)
            .await?
        {
            Some(watch) => watch,
            None => {
                log::warn!(
                    "notification on unknown channel {}, dropping it",
                    notification.channel_id
                );
                return Ok(());
            }
        };

        if watch.token != notification.channel_token {
            log::warn!(
                "notification on channel {} carries a bad token, dropping it",
                notification.channel_id
            );
            return Ok(());
        }

        match state {
            ResourceState::Exists => self.upsert_copies(&watch, &notification.resource_id, report).await,
            ResourceState::NotExists => {
                self.delete_copies(&watch, &notification.resource_id, report).await
            }
            other => {
                log::warn!(
                    "notification for {} has unexpected resource state {:?}, dropping it",
                    notification.resource_id,
                    other
                );
                Ok(())
            }
        }
    }

    /// One event changed: refresh its guest invites and every configured copy of it
    async fn upsert_copies(
        &self,
        watch: &WatchConfig,
        event_id: &str,
        report: &mut PassReport,
    ) -> Result<(), Error> {
        let event = self.client().get_event(&watch.calendar_id, event_id).await?;
        let invite_configs = self
            .store()
            .invite_configs_for_calendar(&watch.calendar_id)
            .await?;
        let copy_configs = self
            .store()
            .copy_configs_for_source(&watch.calendar_id)
            .await?;

        self.invite_event(&event, &invite_configs, report).await;

        for config in &copy_configs {
            let copies = match self
                .find_copies(&config.destination_calendar_id, &config.source_calendar_id, event_id)
                .await
            {
                Ok(copies) => copies,
                Err(error) => {
                    report.failure(
                        ItemOperation::Fetch,
                        &config.destination_calendar_id,
                        event_id,
                        error,
                    );
                    continue;
                }
            };

            if copies.is_empty() {
                let outcome = self
                    .create_request(
                        &config.source_calendar_id,
                        &config.destination_calendar_id,
                        &event,
                    )
                    .await;
                report.record(outcome);
                continue;
            }

            for copy in &copies {
                if let Some(event_patch) = patch::build_patch(&event, copy) {
                    let outcome = self
                        .update_request(&config.destination_calendar_id, &copy.id, event_patch)
                        .await;
                    report.record(outcome);
                }
            }
        }

        Ok(())
    }

    /// One event is gone: remove every configured copy of it
    async fn delete_copies(
        &self,
        watch: &WatchConfig,
        event_id: &str,
        report: &mut PassReport,
    ) -> Result<(), Error> {
        let copy_configs = self
            .store()
            .copy_configs_for_source(&watch.calendar_id)
            .await?;

        for config in &copy_configs {
            match self
                .find_copies(&config.destination_calendar_id, &config.source_calendar_id, event_id)
                .await
            {
                Err(error) => {
                    report.failure(
                        ItemOperation::Fetch,
                        &config.destination_calendar_id,
                        event_id,
                        error,
                    );
                }
                Ok(copies) => {
                    let deletes = copies
                        .iter()
                        .map(|copy| self.delete_request(&config.destination_calendar_id, &copy.id));
                    for outcome in join_all(deletes).await {
                        report.record(outcome);
                    }
                }
            }
        }

        Ok(())
    }
}
