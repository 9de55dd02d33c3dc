//! The errors our collaborators can hand back to us
//!
//! Whether one of these is fatal depends on where it happens: a failed initial listing
//! aborts the pass that needed it, while a failure on a single create/patch/delete is
//! recorded in the [`PassReport`](crate::PassReport) and does not stop its siblings.

use thiserror::Error;

/// An error propagated from one of the external collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The calendar provider rejected or failed a request
    #[error("calendar provider request failed: {0}")]
    Provider(String),

    /// The configuration store could not be read or written
    #[error("configuration store request failed: {0}")]
    Store(String),
}
