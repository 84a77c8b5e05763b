//! Participant readiness gate
//!
//! Snapshot processing waits until the participant list is first known.
//! The gate opens exactly once and never closes again. While it is closed,
//! any number of snapshot notifications collapse into a single pending
//! replay.

/// Two-state readiness machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Participants not yet known; `replay` is set once a snapshot
    /// notification has been deferred
    AwaitingParticipants { replay: bool },
    /// Snapshots are processed as they arrive
    Ready,
}

impl Default for Gate {
    fn default() -> Self {
        Gate::AwaitingParticipants { replay: false }
    }
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Gate::Ready)
    }

    /// Record a snapshot notification
    ///
    /// Returns `true` if the notification must be deferred.
    pub fn defer(&mut self) -> bool {
        match self {
            Gate::AwaitingParticipants { replay } => {
                *replay = true;
                true
            }
            Gate::Ready => false,
        }
    }

    /// Open the gate
    ///
    /// On the transition returns `Some(replay)`, telling whether a deferred
    /// snapshot must be processed now. Returns `None` if already open.
    pub fn open(&mut self) -> Option<bool> {
        match std::mem::replace(self, Gate::Ready) {
            Gate::AwaitingParticipants { replay } => Some(replay),
            Gate::Ready => None,
        }
    }
}
