//! Debounced, single-flight save scheduling.
//!
//! Each session gets one worker task. Handles send it commands; the worker
//! owns the debounce deadline, the in-flight cycle and the display deadline
//! that returns `saved` / `error` to `idle`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use quizdraft_engine::{ExecutionResult, Workspace};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};

use super::{CycleSummary, Executor, StatusReporter};
use crate::config::AutosaveConfig;
use crate::lock;

enum Command {
    Trigger,
    SaveNow(oneshot::Sender<CycleSummary>),
    Shutdown,
}

/// Handle to a session's save worker.
pub struct SaveScheduler {
    tx: mpsc::UnboundedSender<Command>,
    enabled: AtomicBool,
    closed: AtomicBool,
    reporter: Arc<StatusReporter>,
}

impl SaveScheduler {
    /// Spawn the worker. A disabled scheduler ignores save requests until
    /// [`enable`](Self::enable) is called.
    pub fn spawn(
        executor: Executor,
        workspace: Arc<Mutex<Workspace>>,
        reporter: Arc<StatusReporter>,
        config: AutosaveConfig,
        enabled: bool,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            rx,
            executor,
            workspace,
            reporter: reporter.clone(),
            config,
        };
        tokio::spawn(worker.run());

        Self {
            tx,
            enabled: AtomicBool::new(enabled),
            closed: AtomicBool::new(false),
            reporter,
        }
    }

    /// Ask for a save after the quiet period. Each call restarts the timer.
    pub fn trigger_save(&self) {
        if !self.accepts_requests() {
            return;
        }
        self.reporter.trigger();
        let _ = self.tx.send(Command::Trigger);
    }

    /// Run a cycle now, after any cycle already in flight.
    ///
    /// Returns `None` if the scheduler is disabled or torn down.
    pub async fn save_now(&self) -> Option<CycleSummary> {
        if !self.accepts_requests() {
            return None;
        }
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::SaveNow(reply)).ok()?;
        rx.await.ok()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Cancel any pending timer and stop the worker. A cycle in flight runs
    /// to completion but reports nothing.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Command::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn accepts_requests(&self) -> bool {
        self.is_enabled() && !self.is_closed()
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    rx: mpsc::UnboundedReceiver<Command>,
    executor: Executor,
    workspace: Arc<Mutex<Workspace>>,
    reporter: Arc<StatusReporter>,
    config: AutosaveConfig,
}

impl Worker {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;
        let mut idle_at: Option<(Instant, u64)> = None;
        let mut in_flight: Option<(u64, JoinHandle<CycleSummary>)> = None;
        // A request arrived while a cycle was running.
        let mut follow_up = false;
        let mut waiting: Vec<oneshot::Sender<CycleSummary>> = Vec::new();
        let mut queued: Vec<oneshot::Sender<CycleSummary>> = Vec::new();

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Trigger) => {
                        if in_flight.is_some() {
                            follow_up = true;
                        } else {
                            // The cycle may have settled after the handle
                            // reported the edit, leaving `saved` on display.
                            self.reporter.trigger();
                            deadline = Some(Instant::now() + self.config.debounce);
                            idle_at = None;
                        }
                    }
                    Some(Command::SaveNow(reply)) => {
                        deadline = None;
                        if in_flight.is_some() {
                            follow_up = true;
                            queued.push(reply);
                        } else {
                            idle_at = None;
                            waiting.push(reply);
                            in_flight = Some(self.start_cycle());
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    in_flight = Some(self.start_cycle());
                }

                settled = settle(&mut in_flight) => {
                    let cycle = in_flight.take().map(|(cycle, _)| cycle).unwrap_or_default();
                    let summary = settled.unwrap_or_else(|e| {
                        tracing::error!(cycle, error = %e, "Save cycle task failed");
                        CycleSummary::aborted(cycle, e.to_string())
                    });

                    idle_at = self
                        .reporter
                        .cycle_finished(&summary)
                        .map(|generation| (Instant::now() + self.config.saved_display, generation));
                    for reply in waiting.drain(..) {
                        let _ = reply.send(summary.clone());
                    }

                    if std::mem::take(&mut follow_up) {
                        // Follow-ups skip the quiet period.
                        deadline = None;
                        waiting = std::mem::take(&mut queued);
                        in_flight = Some(self.start_cycle());
                    }
                }

                _ = sleep_until(idle_at.map(|(at, _)| at).unwrap_or_else(Instant::now)), if idle_at.is_some() => {
                    if let Some((_, generation)) = idle_at.take() {
                        self.reporter.display_elapsed(generation);
                    }
                }
            }
        }

        if deadline.is_some() {
            tracing::debug!("Pending save cancelled");
            self.reporter.cancelled();
        }
        if let Some((cycle, _)) = in_flight {
            tracing::debug!(cycle, "Save cycle left to finish after shutdown");
        }
        self.reporter.close();
    }

    fn start_cycle(&self) -> (u64, JoinHandle<CycleSummary>) {
        let cycle = self.reporter.cycle_started();
        let executor = self.executor.clone();
        let workspace = self.workspace.clone();

        let handle = tokio::spawn(async move {
            let planned = lock(&workspace).plan();
            let plan = match planned {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::warn!(cycle, error = %e, "Save cycle aborted");
                    return CycleSummary::aborted(cycle, e.to_string());
                }
            };
            if plan.is_empty() {
                tracing::debug!(cycle, "Nothing to save");
                return CycleSummary::completed(cycle, ExecutionResult::new());
            }
            let result = executor.execute(&workspace, &plan, cycle).await;
            CycleSummary::completed(cycle, result)
        });
        (cycle, handle)
    }
}

async fn settle(
    in_flight: &mut Option<(u64, JoinHandle<CycleSummary>)>,
) -> Result<CycleSummary, JoinError> {
    match in_flight {
        Some((_, handle)) => handle.await,
        None => std::future::pending().await,
    }
}
