//! The reconciliation passes
//!
//! A pass is one complete fetch→diff→apply run for a configured rule: one
//! source→destination copy pair, or one guest-invite rule. The fan-out entry points
//! ([`Reconciler::copy_all`], [`Reconciler::invite_all`]) read every configured rule
//! and run the matching pass for each of them, isolating failures so one broken
//! calendar cannot starve the others.
//!
//! Within a pass every create/patch/delete request is an independent unit of work:
//! requests are issued concurrently, joined before the pass returns, and their
//! failures are recorded in the caller's [`PassReport`] rather than aborting
//! siblings. The engine performs no retries of its own; the scheduler that invokes
//! these entry points owns cadence and retry policy.

pub mod report;

use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;

use crate::config::InviteConfig;
use crate::error::Error;
use crate::event::{Attendee, CalendarEvent};
use crate::patch::{self, EventPatch};
use crate::settings::{DuplicatePolicy, Settings};
use crate::traits::{CalendarClient, ConfigStore, TimeWindow};
use report::{ItemFailure, ItemOperation, ItemOutcome, PassEvent, PassReport};

/// Drives the reconciliation passes against a calendar provider and a configuration
/// store.
///
/// The reconciler is stateless between passes: every run re-reads the rules and the
/// event collections it needs, so there is nothing to invalidate and nothing shared
/// between two passes that happen to run at the same time.
pub struct Reconciler<C, S>
where
    C: CalendarClient,
    S: ConfigStore,
{
    client: C,
    store: S,
    settings: Settings,
}

impl<C, S> Reconciler<C, S>
where
    C: CalendarClient,
    S: ConfigStore,
{
    pub fn new(client: C, store: S, settings: Settings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    /// The calendar provider this reconciler talks to
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The configuration store this reconciler reads
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn window(&self) -> TimeWindow {
        TimeWindow::ahead_of(Utc::now(), self.settings.lookahead)
    }

    /// Fetches the upcoming, non-cancelled events of one calendar.
    /// Failing here is fatal to the pass that needed the listing.
    pub(crate) async fn upcoming_events(
        &self,
        calendar_id: &str,
    ) -> Result<Vec<CalendarEvent>, Error> {
        self.client.list_events(calendar_id, self.window()).await
    }

    /// Runs the copy pass for every configured source→destination pair.
    ///
    /// Pairs run concurrently and fail independently: a pair whose initial fetch
    /// fails is recorded in the report without preventing the other pairs from
    /// reconciling. Only the listing of the copy configs themselves is fatal.
    pub async fn copy_all(&self, report: &mut PassReport) -> Result<(), Error> {
        report.feedback(PassEvent::Started);
        let result = self.copy_all_inner(report).await;
        report.feedback(PassEvent::Finished {
            success: result.is_ok() && report.is_success(),
        });
        result
    }

    async fn copy_all_inner(&self, report: &mut PassReport) -> Result<(), Error> {
        let configs = self.store.copy_configs().await?;

        let pair_runs = configs.iter().map(|config| async move {
            let mut pair_report = PassReport::new();
            let outcome = self
                .copy_calendar(
                    &config.source_calendar_id,
                    &config.destination_calendar_id,
                    &mut pair_report,
                )
                .await;
            (config, outcome, pair_report)
        });

        for (config, outcome, pair_report) in join_all(pair_runs).await {
            report.merge(pair_report);
            if let Err(error) = outcome {
                report.sub_pass_failure(
                    &format!(
                        "copy of {} into {}",
                        config.source_calendar_id, config.destination_calendar_id
                    ),
                    error,
                );
            }
        }

        Ok(())
    }

    /// Reconciles one source→destination pair.
    ///
    /// Destination events tagged for other sources are ignored: several copy rules
    /// may share a destination without stepping on each other. Source events with no
    /// copy are created, diverged copies are patched (untouched when the diff is
    /// empty), and copies whose source event is gone are deleted. The three request
    /// batches are issued concurrently and joined before returning.
    pub async fn copy_calendar(
        &self,
        source_calendar_id: &str,
        destination_calendar_id: &str,
        report: &mut PassReport,
    ) -> Result<(), Error> {
        report.feedback(PassEvent::InProgress {
            calendar: destination_calendar_id.to_string(),
            details: format!("mirroring {}", source_calendar_id),
        });

        let source_events = self.upcoming_events(source_calendar_id).await?;
        let destination_events = self.upcoming_events(destination_calendar_id).await?;

        let sources_by_id: HashMap<&str, &CalendarEvent> = source_events
            .iter()
            .map(|event| (event.id.as_str(), event))
            .collect();

        let copies_by_source_item = keyed_by_source_item(
            destination_events
                .iter()
                .filter(|event| event.source_calendar_id() == source_calendar_id),
            self.settings.duplicates,
        );

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();

        for (id, source_event) in &sources_by_id {
            match copies_by_source_item.get(*id) {
                Some(copy) => {
                    if let Some(event_patch) = patch::build_patch(source_event, copy) {
                        updates.push(self.update_request(
                            destination_calendar_id,
                            &copy.id,
                            event_patch,
                        ));
                    }
                }
                None => {
                    creates.push(self.create_request(
                        source_calendar_id,
                        destination_calendar_id,
                        source_event,
                    ));
                }
            }
        }

        for (id, copy) in &copies_by_source_item {
            if !sources_by_id.contains_key(*id) {
                deletes.push(self.delete_request(destination_calendar_id, &copy.id));
            }
        }

        let (created, updated, deleted) =
            futures::join!(join_all(creates), join_all(updates), join_all(deletes));
        for outcome in created.into_iter().chain(updated).chain(deleted) {
            report.record(outcome);
        }

        Ok(())
    }

    /// Runs the invite pass for every configured guest rule, with the same
    /// per-rule failure isolation as [`Self::copy_all`].
    pub async fn invite_all(&self, report: &mut PassReport) -> Result<(), Error> {
        report.feedback(PassEvent::Started);
        let result = self.invite_all_inner(report).await;
        report.feedback(PassEvent::Finished {
            success: result.is_ok() && report.is_success(),
        });
        result
    }

    async fn invite_all_inner(&self, report: &mut PassReport) -> Result<(), Error> {
        let configs = self.store.invite_configs().await?;

        let rule_runs = configs.iter().map(|config| async move {
            let mut rule_report = PassReport::new();
            let outcome = self
                .invite_calendar(&config.calendar_id, &config.email_address, &mut rule_report)
                .await;
            (config, outcome, rule_report)
        });

        for (config, outcome, rule_report) in join_all(rule_runs).await {
            report.merge(rule_report);
            if let Err(error) = outcome {
                report.sub_pass_failure(
                    &format!("invites of {} to {}", config.email_address, config.calendar_id),
                    error,
                );
            }
        }

        Ok(())
    }

    /// Ensures `email_address` is on the attendee list of every upcoming event of
    /// `calendar_id`. Events already carrying the address (exact match) are left
    /// alone; the others get the full list patched back with the guest appended.
    pub async fn invite_calendar(
        &self,
        calendar_id: &str,
        email_address: &str,
        report: &mut PassReport,
    ) -> Result<(), Error> {
        report.feedback(PassEvent::InProgress {
            calendar: calendar_id.to_string(),
            details: format!("inviting {}", email_address),
        });

        let events = self.upcoming_events(calendar_id).await?;

        let invites = events
            .iter()
            .filter(|event| !attendees_contain(&event.attendees, email_address))
            .map(|event| self.invite_request(calendar_id, event, email_address));

        for outcome in join_all(invites).await {
            report.record(outcome);
        }

        Ok(())
    }

    /// Applies a set of invite rules to one already-fetched event. This is the
    /// targeted flavour of [`Self::invite_calendar`] used when a push notification
    /// names a single changed event.
    pub async fn invite_event(
        &self,
        event: &CalendarEvent,
        configs: &[InviteConfig],
        report: &mut PassReport,
    ) {
        let invites = configs
            .iter()
            .filter(|config| !attendees_contain(&event.attendees, &config.email_address))
            .map(|config| self.invite_request(&config.calendar_id, event, &config.email_address));

        for outcome in join_all(invites).await {
            report.record(outcome);
        }
    }

    /// Finds the destination events that are copies of one specific source event
    pub(crate) async fn find_copies(
        &self,
        destination_calendar_id: &str,
        source_calendar_id: &str,
        source_item_id: &str,
    ) -> Result<Vec<CalendarEvent>, Error> {
        let events = self.upcoming_events(destination_calendar_id).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.is_copy_of(source_calendar_id, source_item_id))
            .collect())
    }

    pub(crate) async fn create_request(
        &self,
        source_calendar_id: &str,
        destination_calendar_id: &str,
        source_event: &CalendarEvent,
    ) -> ItemOutcome {
        let copy = patch::build_copy(source_calendar_id, source_event);
        match self.client.create_event(destination_calendar_id, copy).await {
            Ok(created) => Ok((
                ItemOperation::Create,
                destination_calendar_id.to_string(),
                created.id,
            )),
            Err(error) => Err(ItemFailure {
                calendar_id: destination_calendar_id.to_string(),
                item_id: source_event.id.clone(),
                operation: ItemOperation::Create,
                error,
            }),
        }
    }

    pub(crate) async fn update_request(
        &self,
        calendar_id: &str,
        event_id: &str,
        event_patch: EventPatch,
    ) -> ItemOutcome {
        match self.client.patch_event(calendar_id, event_id, event_patch).await {
            Ok(updated) => Ok((ItemOperation::Update, calendar_id.to_string(), updated.id)),
            Err(error) => Err(ItemFailure {
                calendar_id: calendar_id.to_string(),
                item_id: event_id.to_string(),
                operation: ItemOperation::Update,
                error,
            }),
        }
    }

    pub(crate) async fn delete_request(&self, calendar_id: &str, event_id: &str) -> ItemOutcome {
        match self.client.delete_event(calendar_id, event_id).await {
            Ok(()) => Ok((
                ItemOperation::Delete,
                calendar_id.to_string(),
                event_id.to_string(),
            )),
            Err(error) => Err(ItemFailure {
                calendar_id: calendar_id.to_string(),
                item_id: event_id.to_string(),
                operation: ItemOperation::Delete,
                error,
            }),
        }
    }

    async fn invite_request(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
        email_address: &str,
    ) -> ItemOutcome {
        let mut attendees = event.attendees.clone();
        attendees.push(Attendee::guest(email_address));
        let event_patch = EventPatch::with_attendees(attendees);

        match self.client.patch_event(calendar_id, &event.id, event_patch).await {
            Ok(updated) => Ok((ItemOperation::Invite, calendar_id.to_string(), updated.id)),
            Err(error) => Err(ItemFailure {
                calendar_id: calendar_id.to_string(),
                item_id: event.id.clone(),
                operation: ItemOperation::Invite,
                error,
            }),
        }
    }
}

fn attendees_contain(attendees: &[Attendee], email_address: &str) -> bool {
    attendees.iter().any(|attendee| attendee.email == email_address)
}

/// Indexes destination copies by their correlation key.
///
/// When two copies carry the same key, `policy` picks the survivor and the collision
/// is logged; the losers are neither reconciled nor cleaned up here. Copies with an
/// empty key (a calendar tag but no item tag) end up under `""`, which no source
/// event ever uses, so the stale-copy deletion picks them up.
fn keyed_by_source_item<'a, I>(
    events: I,
    policy: DuplicatePolicy,
) -> HashMap<&'a str, &'a CalendarEvent>
where
    I: Iterator<Item = &'a CalendarEvent>,
{
    let mut keyed: HashMap<&str, &CalendarEvent> = HashMap::new();

    for event in events {
        let key = event.source_item_id();
        match keyed.get(key) {
            None => {
                keyed.insert(key, event);
            }
            Some(existing) => {
                log::warn!(
                    "events {} and {} are both copies of {:?}; keeping the {} one",
                    existing.id,
                    event.id,
                    key,
                    match policy {
                        DuplicatePolicy::KeepFirst => "first",
                        DuplicatePolicy::KeepLast => "last",
                    }
                );
                if policy == DuplicatePolicy::KeepLast {
                    keyed.insert(key, event);
                }
            }
        }
    }

    keyed
}
