//! Save-status reporting.
//!
//! Wraps the engine's [`StatusMachine`] and publishes every report on a
//! `watch` channel, so WebSocket clients and HTTP handlers always see the
//! latest state. Lock order is machine, then workspace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use quizdraft_engine::{StatusMachine, StatusReport, Workspace};
use tokio::sync::watch;

use super::CycleSummary;
use crate::lock;

/// Publishes status reports for one session.
pub struct StatusReporter {
    machine: Mutex<StatusMachine>,
    workspace: Arc<Mutex<Workspace>>,
    tx: watch::Sender<StatusReport>,
    closed: AtomicBool,
}

impl StatusReporter {
    pub fn new(workspace: Arc<Mutex<Workspace>>) -> Self {
        let machine = StatusMachine::new();
        let report = machine.report(lock(&workspace).pending_changes());
        let (tx, _) = watch::channel(report);
        Self {
            machine: Mutex::new(machine),
            workspace,
            tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Receive every report from now on.
    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.tx.subscribe()
    }

    /// The current report, with a freshly computed pending count.
    pub fn current(&self) -> StatusReport {
        let machine = lock(&self.machine);
        self.report(&machine)
    }

    /// Publish the current report, e.g. after the pending count changed.
    pub fn refresh(&self) {
        self.update(|_| true);
    }

    /// A save was requested.
    pub fn trigger(&self) -> bool {
        self.update(StatusMachine::on_trigger)
    }

    /// A cycle began. Returns its number.
    pub fn cycle_started(&self) -> u64 {
        let mut cycle = 0;
        self.update(|machine| {
            cycle = machine.on_cycle_started();
            true
        });
        cycle
    }

    /// A cycle settled. Returns the generation to hand back to
    /// [`display_elapsed`](Self::display_elapsed), if a display interval
    /// should be armed.
    pub fn cycle_finished(&self, summary: &CycleSummary) -> Option<u64> {
        let mut generation = None;
        self.update(|machine| {
            generation = match &summary.error {
                Some(message) => Some(machine.on_cycle_aborted(message.clone())),
                None => machine.on_cycle_finished(&summary.result),
            };
            true
        });
        generation
    }

    pub fn display_elapsed(&self, generation: u64) -> bool {
        self.update(|machine| machine.on_display_elapsed(generation))
    }

    /// A pending save was cancelled.
    pub fn cancelled(&self) -> bool {
        self.update(StatusMachine::on_cancelled)
    }

    /// Stop publishing. Later updates still move the machine but reach no
    /// one.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn update<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut StatusMachine) -> bool,
    {
        let mut machine = lock(&self.machine);
        let changed = apply(&mut *machine);
        if changed && !self.is_closed() {
            let report = self.report(&machine);
            tracing::debug!(
                state = ?report.state,
                pending = report.pending_changes,
                cycle = report.cycle,
                "Status changed"
            );
            self.tx.send_replace(report);
        }
        changed
    }

    fn report(&self, machine: &StatusMachine) -> StatusReport {
        machine.report(lock(&self.workspace).pending_changes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz_schema::quiz_schema;
    use quizdraft_engine::{
        ExecutionResult, FailureReason, Identity, OpKind, Record, SaveState,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn reporter() -> (StatusReporter, Arc<Mutex<Workspace>>) {
        let ws = Workspace::load(
            quiz_schema(),
            Record::new("quiz-1", json!({"title": "Capitals"})),
            BTreeMap::new(),
        )
        .unwrap();
        let ws = Arc::new(Mutex::new(ws));
        (StatusReporter::new(ws.clone()), ws)
    }

    #[test]
    fn pending_count_follows_the_tree() {
        let (reporter, ws) = reporter();
        let rx = reporter.subscribe();
        assert_eq!(rx.borrow().pending_changes, 0);

        lock(&ws)
            .insert("questions", None, json!({"text": "France?"}))
            .unwrap();
        assert_eq!(reporter.current().pending_changes, 1);

        reporter.refresh();
        assert_eq!(rx.borrow().pending_changes, 1);
    }

    #[test]
    fn cycle_lifecycle_is_published() {
        let (reporter, _ws) = reporter();
        let rx = reporter.subscribe();

        assert!(reporter.trigger());
        assert_eq!(rx.borrow().state, SaveState::Pending);

        assert_eq!(reporter.cycle_started(), 1);
        assert_eq!(rx.borrow().state, SaveState::Saving);

        let mut result = ExecutionResult::new();
        result.failed(
            "questions",
            Identity::provisional("1"),
            OpKind::Insert,
            FailureReason::Remote("timeout".into()),
        );
        let generation = reporter
            .cycle_finished(&CycleSummary::completed(1, result))
            .unwrap();
        assert!(matches!(&rx.borrow().state, SaveState::Error { failed, .. } if failed.len() == 1));

        assert!(reporter.display_elapsed(generation));
        assert_eq!(rx.borrow().state, SaveState::Idle);
    }

    #[test]
    fn aborted_cycle_reports_message() {
        let (reporter, _ws) = reporter();
        reporter.cycle_started();
        let generation = reporter.cycle_finished(&CycleSummary::aborted(1, "no root"));
        assert!(generation.is_some());
        assert_eq!(
            reporter.current().state,
            SaveState::Error {
                failed: Vec::new(),
                message: Some("no root".into())
            }
        );
    }

    #[test]
    fn closed_reporter_publishes_nothing() {
        let (reporter, _ws) = reporter();
        let rx = reporter.subscribe();
        reporter.trigger();
        reporter.cycle_started();
        reporter.close();

        reporter.cycle_finished(&CycleSummary::completed(1, ExecutionResult::new()));
        assert_eq!(rx.borrow().state, SaveState::Saving);
        assert!(reporter.is_closed());
    }
}
