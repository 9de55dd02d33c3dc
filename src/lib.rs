//! This crate keeps externally-hosted calendars consistent with each other.
//!
//! It is a reconciliation engine: given a set of mirroring rules (copy every upcoming
//! event of calendar A onto calendar B, tagged with where it came from) and guest
//! rules (make sure this address is invited to everything on calendar C), it computes
//! and applies the minimal set of provider writes that makes the world match the
//! rules. Re-running a pass over an unchanged world performs zero writes.
//!
//! The engine talks to the outside world through two narrow contracts in [`traits`]:
//! a [`CalendarClient`](traits::CalendarClient) for the provider API and a
//! [`ConfigStore`](traits::ConfigStore) for the stored rules and watch bookkeeping.
//! A scheduler is expected to invoke the fan-out entry points
//! ([`Reconciler::copy_all`], [`Reconciler::invite_all`],
//! [`Reconciler::ensure_watches`]) on a fixed cadence, and a web endpoint to hand
//! incoming push notifications to
//! [`Reconciler::process_notification`](crate::Reconciler::process_notification) for
//! targeted, single-event reconciliation. Durability, retries and timeouts belong to
//! those callers; the engine itself is stateless between passes.

pub mod config;
pub mod error;
pub mod event;
pub mod patch;
pub mod reconcile;
pub mod settings;
pub mod traits;
mod watch;
pub mod webhook;

pub use config::{CopyConfig, InviteConfig, WatchConfig};
pub use error::Error;
pub use event::{Attendee, CalendarEvent, EventDateTime};
pub use patch::{build_copy, build_patch, DateTimePatch, EventPatch};
pub use reconcile::report::{
    feedback_channel, ItemFailure, ItemOperation, PassEvent, PassReport,
};
pub use reconcile::Reconciler;
pub use settings::{DuplicatePolicy, Settings};
pub use traits::{CalendarClient, ConfigStore, Subscription, TimeWindow};
pub use webhook::{Notification, ResourceState};
