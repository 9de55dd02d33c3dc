//! Keeping push-notification subscriptions alive
//!
//! Provider-side watch channels expire on their own. This pass prunes the stale
//! bookkeeping rows and registers a channel for every calendar referenced by a copy
//! or invite rule that lacks a live one, so at most one live subscription exists per
//! calendar.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use futures::future::join_all;

use crate::config::WatchConfig;
use crate::error::Error;
use crate::reconcile::report::{ItemFailure, ItemOperation, ItemOutcome, PassEvent, PassReport};
use crate::reconcile::Reconciler;
use crate::traits::{CalendarClient, ConfigStore};

impl<C, S> Reconciler<C, S>
where
    C: CalendarClient,
    S: ConfigStore,
{
    /// Runs the watch lifecycle pass.
    ///
    /// Expired rows (no expiration, or one in the past) are deleted from the store
    /// best-effort; the provider-side channels are left to lapse on their own. The
    /// calendars referenced by the invite rules and by both sides of the copy rules
    /// are then subscribed, skipping those already covered by a live row. The list of
    /// calendars to subscribe is deduplicated up front, so a calendar referenced by
    /// several rules gets one request; prunes and subscriptions are then issued
    /// concurrently and joined. Only the three initial store listings are fatal.
    pub async fn ensure_watches(&self, report: &mut PassReport) -> Result<(), Error> {
        report.feedback(PassEvent::Started);
        let result = self.ensure_watches_inner(report).await;
        report.feedback(PassEvent::Finished {
            success: result.is_ok() && report.is_success(),
        });
        result
    }

    async fn ensure_watches_inner(&self, report: &mut PassReport) -> Result<(), Error> {
        let now = Utc::now();

        let watches = self.store().watch_configs().await?;
        let (live, expired): (Vec<WatchConfig>, Vec<WatchConfig>) =
            watches.into_iter().partition(|watch| watch.is_live(now));

        let mut covered: HashSet<String> = live
            .into_iter()
            .map(|watch| watch.calendar_id)
            .collect();

        let invite_configs = self.store().invite_configs().await?;
        let copy_configs = self.store().copy_configs().await?;

        let referenced = invite_configs
            .iter()
            .map(|config| config.calendar_id.as_str())
            .chain(copy_configs.iter().flat_map(|config| {
                [
                    config.source_calendar_id.as_str(),
                    config.destination_calendar_id.as_str(),
                ]
            }));

        let mut to_subscribe: Vec<&str> = Vec::new();
        for calendar_id in referenced {
            if covered.insert(calendar_id.to_string()) {
                to_subscribe.push(calendar_id);
            }
        }

        let prunes = expired.iter().map(|watch| self.prune_request(watch));
        let subscriptions = to_subscribe
            .iter()
            .map(|calendar_id| self.subscribe_request(calendar_id));

        let (pruned, subscribed) = futures::join!(join_all(prunes), join_all(subscriptions));
        for outcome in pruned.into_iter().chain(subscribed) {
            report.record(outcome);
        }

        Ok(())
    }

    /// Removes one expired watch row. Only the local bookkeeping is touched.
    async fn prune_request(&self, watch: &WatchConfig) -> ItemOutcome {
        match self.store().delete_watch_config(watch.id).await {
            Ok(()) => Ok((
                ItemOperation::PruneWatch,
                watch.calendar_id.clone(),
                watch.channel_id.clone(),
            )),
            Err(error) => Err(ItemFailure {
                calendar_id: watch.calendar_id.clone(),
                item_id: watch.channel_id.clone(),
                operation: ItemOperation::PruneWatch,
                error,
            }),
        }
    }

    /// Registers a channel for one calendar and persists the bookkeeping row
    async fn subscribe_request(&self, calendar_id: &str) -> ItemOutcome {
        let address = &self.settings().webhook_address;
        let subscription = match self.client().create_subscription(calendar_id, address).await {
            Ok(subscription) => subscription,
            Err(error) => {
                return Err(ItemFailure {
                    calendar_id: calendar_id.to_string(),
                    item_id: String::new(),
                    operation: ItemOperation::Subscribe,
                    error,
                })
            }
        };

        // stored rows always carry a real, future expiry
        let expiration = match Utc.timestamp_millis_opt(subscription.expiration_ms).single() {
            Some(expiration) if subscription.expiration_ms > 0 => expiration,
            _ => {
                return Err(ItemFailure {
                    calendar_id: calendar_id.to_string(),
                    item_id: subscription.channel_id.clone(),
                    operation: ItemOperation::Subscribe,
                    error: Error::Provider(format!(
                        "subscription carries an invalid expiration ({})",
                        subscription.expiration_ms
                    )),
                })
            }
        };

        match self
            .store()
            .create_watch_config(
                calendar_id,
                &subscription.channel_id,
                &subscription.token,
                expiration,
            )
            .await
        {
            Ok(watch) => Ok((
                ItemOperation::Subscribe,
                watch.calendar_id,
                watch.channel_id,
            )),
            Err(error) => Err(ItemFailure {
                calendar_id: calendar_id.to_string(),
                item_id: subscription.channel_id,
                operation: ItemOperation::Subscribe,
                error,
            }),
        }
    }
}
