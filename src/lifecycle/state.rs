//! Daemon lifecycle state machine.
//!
//! # State Transitions
//! ```text
//! Uninitialized → Initializing → Running → ShuttingDown → Stopped
//!                      │                       │
//!                      └→ Failed               └→ ForceTerminated
//! ```
//!
//! `Failed`, `Stopped` and `ForceTerminated` are terminal.

use std::fmt;

/// Current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    /// Running the startup pipeline.
    Initializing,
    /// A startup step failed; the daemon never ran.
    Failed,
    /// Handles live, waiting for the stop signal.
    Running,
    /// Closing handles under the watchdog.
    ShuttingDown,
    Stopped,
    /// The watchdog expired before shutdown completed.
    ForceTerminated,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped | Self::ForceTerminated)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Running)
                | (Initializing, Failed)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
                | (ShuttingDown, ForceTerminated)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
            Self::ForceTerminated => "force_terminated",
        };
        f.write_str(name)
    }
}

/// Tracks the daemon's lifecycle state and logs every transition.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Move to `next`. Illegal transitions are refused and logged.
    pub fn transition(&mut self, next: LifecycleState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Refusing illegal lifecycle transition");
            return false;
        }
        tracing::info!(from = %self.state, to = %next, "Lifecycle state transition");
        self.state = next;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
