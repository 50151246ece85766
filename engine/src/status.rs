//! Save-status state machine.
//!
//! ```text
//! idle -> pending -> saving -> saved -> idle
//!                           -> error -> idle
//! ```
//!
//! The machine holds no timers. Whoever drives it (the scheduler) owns the
//! debounce and display deadlines and reports their expiry back. Expiry of a
//! display deadline carries the generation it was armed for, so a deadline
//! that outlived its state is ignored.

use crate::{ExecutionResult, FailedEntity};
use serde::{Deserialize, Serialize};

/// Current save status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SaveState {
    /// Nothing scheduled, nothing running
    #[default]
    Idle,
    /// Debounce timer running
    Pending,
    /// Cycle in flight
    Saving,
    /// Last cycle fully succeeded
    Saved,
    /// Last cycle failed, in whole or in part
    Error {
        failed: Vec<FailedEntity>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl SaveState {
    /// Whether the state returns to idle on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, SaveState::Saved | SaveState::Error { .. })
    }
}

/// A status report as observed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(flatten)]
    pub state: SaveState,
    /// Root (0 or 1) plus dirty and deleted entities, recomputed on demand
    pub pending_changes: usize,
    /// Number of cycles started so far
    pub cycle: u64,
}

/// The status state machine.
#[derive(Debug, Clone, Default)]
pub struct StatusMachine {
    state: SaveState,
    generation: u64,
    cycle: u64,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    /// Number of cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Build a report with the given pending-change count.
    pub fn report(&self, pending_changes: usize) -> StatusReport {
        StatusReport {
            state: self.state.clone(),
            pending_changes,
            cycle: self.cycle,
        }
    }

    /// A save was requested. Returns whether the state changed.
    ///
    /// While saving, the state is left alone; the follow-up cycle is the
    /// scheduler's concern.
    pub fn on_trigger(&mut self) -> bool {
        match self.state {
            SaveState::Pending | SaveState::Saving => false,
            _ => self.transition(SaveState::Pending),
        }
    }

    /// A cycle began. Returns the cycle number.
    pub fn on_cycle_started(&mut self) -> u64 {
        self.cycle += 1;
        self.transition(SaveState::Saving);
        self.cycle
    }

    /// A cycle settled.
    ///
    /// Returns the generation to pass to [`on_display_elapsed`] once the
    /// display interval is over, or `None` if the machine went straight back
    /// to idle (nothing was planned).
    ///
    /// [`on_display_elapsed`]: StatusMachine::on_display_elapsed
    pub fn on_cycle_finished(&mut self, result: &ExecutionResult) -> Option<u64> {
        if result.is_empty() {
            self.transition(SaveState::Idle);
            return None;
        }
        let next = if result.is_success() {
            SaveState::Saved
        } else {
            SaveState::Error {
                failed: result.failures(),
                message: None,
            }
        };
        self.transition(next);
        Some(self.generation)
    }

    /// A cycle could not run at all.
    pub fn on_cycle_aborted(&mut self, message: impl Into<String>) -> u64 {
        self.transition(SaveState::Error {
            failed: Vec::new(),
            message: Some(message.into()),
        });
        self.generation
    }

    /// The display interval armed at `generation` ran out.
    pub fn on_display_elapsed(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.state.is_transient() {
            return false;
        }
        self.transition(SaveState::Idle)
    }

    /// A pending timer was cancelled without running a cycle.
    pub fn on_cancelled(&mut self) -> bool {
        match self.state {
            SaveState::Pending => self.transition(SaveState::Idle),
            _ => false,
        }
    }

    fn transition(&mut self, next: SaveState) -> bool {
        self.generation += 1;
        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }
}
