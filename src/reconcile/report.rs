//! Utilities to track the progression and the failures of a reconciliation pass

use std::fmt::{Display, Error, Formatter};

/// An event that happens during a reconciliation pass
#[derive(Clone, Debug)]
pub enum PassEvent {
    /// The pass has not started
    NotStarted,
    /// The pass has just started but no calendar is handled yet
    Started,
    /// The pass is working on one calendar
    InProgress { calendar: String, details: String },
    /// The pass is finished
    Finished { success: bool },
}

impl Display for PassEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            PassEvent::NotStarted => write!(f, "Not started"),
            PassEvent::Started => write!(f, "Pass has started..."),
            PassEvent::InProgress { calendar, details } => write!(f, "[{}] {}...", calendar, details),
            PassEvent::Finished { success } => match success {
                true => write!(f, "Pass successfully finished"),
                false => write!(f, "Pass finished with errors"),
            },
        }
    }
}

impl Default for PassEvent {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// See [`feedback_channel`]
pub type FeedbackSender = tokio::sync::watch::Sender<PassEvent>;
/// See [`feedback_channel`]
pub type FeedbackReceiver = tokio::sync::watch::Receiver<PassEvent>;

/// Create a feedback channel, that can be used to observe the progress of a running pass
pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    tokio::sync::watch::channel(PassEvent::default())
}

/// The operation a reconciled item was undergoing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemOperation {
    /// Listing a collection a sub-pass needed
    Fetch,
    /// Creating a destination copy
    Create,
    /// Patching a destination copy
    Update,
    /// Deleting a stale destination copy
    Delete,
    /// Appending a guest to an attendee list
    Invite,
    /// Registering a push-notification channel
    Subscribe,
    /// Removing an expired watch row
    PruneWatch,
}

impl Display for ItemOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            ItemOperation::Fetch => write!(f, "fetch"),
            ItemOperation::Create => write!(f, "create"),
            ItemOperation::Update => write!(f, "update"),
            ItemOperation::Delete => write!(f, "delete"),
            ItemOperation::Invite => write!(f, "invite"),
            ItemOperation::Subscribe => write!(f, "subscribe"),
            ItemOperation::PruneWatch => write!(f, "prune watch"),
        }
    }
}

/// One item-local failure. The batch it belonged to completed regardless; the next
/// sweep or push notification picks the item up again.
#[derive(Clone, Debug)]
pub struct ItemFailure {
    pub calendar_id: String,
    pub item_id: String,
    pub operation: ItemOperation,
    pub error: crate::error::Error,
}

/// What one concurrently-issued request ended up doing: the operation with its
/// calendar and item ids on success, or the failure to record
pub(crate) type ItemOutcome = Result<(ItemOperation, String, String), ItemFailure>;

/// A structure that tracks the outcome of a reconciliation pass
///
/// It logs as the pass goes (through the `log::*` macros) and keeps every item-local
/// failure so callers and tests can inspect partial failure instead of grepping logs.
/// Fatal errors are returned by the pass itself and never end up here.
#[derive(Default)]
pub struct PassReport {
    applied: u32,
    failures: Vec<ItemFailure>,
    feedback_channel: Option<FeedbackSender>,
}

impl PassReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_feedback_channel(channel: FeedbackSender) -> Self {
        Self {
            feedback_channel: Some(channel),
            ..Self::default()
        }
    }

    /// Whether every issued request succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// How many write requests were applied
    pub fn applied(&self) -> u32 {
        self.applied
    }

    /// The item-local failures collected so far
    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// Record one successfully applied operation
    pub fn success(&mut self, operation: ItemOperation, calendar_id: &str, item_id: &str) {
        log::debug!("applied {} for {} on calendar {}", operation, item_id, calendar_id);
        self.applied += 1;
    }

    /// Record one item-local failure
    pub fn failure(
        &mut self,
        operation: ItemOperation,
        calendar_id: &str,
        item_id: &str,
        error: crate::error::Error,
    ) {
        log::error!(
            "failed to {} {} on calendar {}: {}",
            operation,
            item_id,
            calendar_id,
            error
        );
        self.failures.push(ItemFailure {
            calendar_id: calendar_id.to_string(),
            item_id: item_id.to_string(),
            operation,
            error,
        });
    }

    /// Record a whole sub-pass that could not run because its initial fetch failed
    pub fn sub_pass_failure(&mut self, context: &str, error: crate::error::Error) {
        log::error!("skipping {}: {}", context, error);
        self.failures.push(ItemFailure {
            calendar_id: context.to_string(),
            item_id: String::new(),
            operation: ItemOperation::Fetch,
            error,
        });
    }

    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            Ok((operation, calendar_id, item_id)) => self.success(operation, &calendar_id, &item_id),
            Err(failure) => {
                log::error!(
                    "failed to {} {} on calendar {}: {}",
                    failure.operation,
                    failure.item_id,
                    failure.calendar_id,
                    failure.error
                );
                self.failures.push(failure);
            }
        }
    }

    /// Fold the outcome of a sibling sub-pass into this report
    pub fn merge(&mut self, other: PassReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }

    /// Send an event as a feedback to the listener (if any)
    pub fn feedback(&mut self, event: PassEvent) {
        if let Some(sender) = self.feedback_channel.as_ref() {
            let _ = sender.send(event);
        }
    }
}
