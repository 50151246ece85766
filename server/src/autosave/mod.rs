//! Autosave: cycle execution, debouncing, and status reporting.
//!
//! A session owns one [`SaveScheduler`]. Edits call `trigger_save`; once the
//! quiet period passes, the scheduler runs a cycle on the [`Executor`] and
//! feeds the outcome to the [`StatusReporter`].

mod executor;
mod reporter;
mod scheduler;

pub use executor::Executor;
pub use reporter::StatusReporter;
pub use scheduler::SaveScheduler;

use quizdraft_engine::{ExecutionResult, FailedEntity, Verdict};
use serde::Serialize;

/// Summary of one save cycle, as returned to `save_now` callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    /// Cycle number within the session
    pub cycle: u64,
    pub verdict: Verdict,
    /// Planned operations, attempted or not
    pub operations: usize,
    pub failed: Vec<FailedEntity>,
    /// Set when the cycle could not run at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

impl CycleSummary {
    /// Summary of a cycle that ran.
    pub fn completed(cycle: u64, result: ExecutionResult) -> Self {
        Self {
            cycle,
            verdict: result.verdict(),
            operations: result.len(),
            failed: result.failures(),
            error: None,
            result,
        }
    }

    /// Summary of a cycle that never reached the remote store.
    pub fn aborted(cycle: u64, error: impl Into<String>) -> Self {
        Self {
            cycle,
            verdict: Verdict::Partial,
            operations: 0,
            failed: Vec::new(),
            error: Some(error.into()),
            result: ExecutionResult::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }
}
