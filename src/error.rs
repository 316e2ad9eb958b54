//! Top-level error taxonomy.
//!
//! Every failure mode of a run maps to one of these kinds; all of them are
//! fatal to the run and all of them still release the vehicle link.

use crate::flight::RunError;
use crate::link::LinkError;
use crate::source::SourceError;
use crate::sync::SyncError;
use waypilot_core::wpl::WplError;

#[derive(Debug, thiserror::Error)]
pub enum PilotError {
    /// Malformed or unsupported-version waypoint text
    #[error(transparent)]
    Format(#[from] WplError),

    /// Local file or remote fetch failure
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Vehicle link failure outside the flight loop
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Mission upload/download/save failure
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Flight phase failure (link loss or phase stall)
    #[error(transparent)]
    Flight(#[from] RunError),
}
