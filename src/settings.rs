//! Engine settings
//!
//! Every knob is an explicit value handed to the [`Reconciler`](crate::Reconciler) at
//! construction; the engine keeps no global state.

use chrono::Duration;
use url::Url;

/// What the copy pass does when two destination events carry the same correlation key
/// (duplicates left behind by an earlier race).
///
/// Whichever match survives is the one diffed and patched; the others are left alone
/// and reported in the logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Reconcile against the first match encountered
    KeepFirst,
    /// Reconcile against the last match encountered
    KeepLast,
}

/// Engine-wide settings
#[derive(Clone, Debug)]
pub struct Settings {
    /// The address the provider pushes notifications to
    pub webhook_address: Url,
    /// How far ahead of now the passes look when listing events
    pub lookahead: Duration,
    /// Duplicate-destination handling for the copy pass
    pub duplicates: DuplicatePolicy,
}

impl Settings {
    /// Settings with the default 14-day lookahead window
    pub fn new(webhook_address: Url) -> Self {
        Self {
            webhook_address,
            lookahead: Duration::days(14),
            duplicates: DuplicatePolicy::KeepLast,
        }
    }
}
