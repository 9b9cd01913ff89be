//! Action state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state of one pipeline action.
///
/// `Preceding -> Running -> {Done, Error, Stopped}`, with `resume()`
/// re-entering `Running` from `Error` or `Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    /// Created, not yet executed.
    #[default]
    Preceding,
    /// Remote work in flight.
    Running,
    /// Completed with a memoized result.
    Done,
    /// Failed; the error has been surfaced to the caller.
    Error,
    /// Stopped by an explicit cancel.
    Stopped,
}

impl ActionState {
    /// Checks if the action can transition to the given state.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            (Self::Preceding, Self::Running | Self::Stopped) => true,
            (Self::Running, Self::Done | Self::Error | Self::Stopped) => true,
            // resume() re-enters Running after a crash or explicit stop.
            (Self::Error | Self::Stopped, Self::Running) => true,
            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preceding => f.write_str("Preceding"),
            Self::Running => f.write_str("Running"),
            Self::Done => f.write_str("Done"),
            Self::Error => f.write_str("Error"),
            Self::Stopped => f.write_str("Stopped"),
        }
    }
}
