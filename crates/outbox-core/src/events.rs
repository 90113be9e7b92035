use serde::Serialize;

use crate::models::ActionKind;

/// Tally of one pass over the ready queue items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed, scheduled for another attempt
    pub retrying: usize,
    /// Failed for the last time
    pub exhausted: usize,
    /// Connectivity dropped before every ready item was attempted
    pub interrupted: bool,
}

/// Notifications from the controller. Subscribers that lag simply miss events;
/// the stored state stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ConnectivityChanged { online: bool },
    DrainStarted { ready: usize },
    DrainFinished(DrainReport),
    /// A queue item hit its retry ceiling and needs the user's attention
    ActionExhausted {
        id: String,
        kind: ActionKind,
        last_error: Option<String>,
    },
}
