//! Start/stop/force-scan control over the poll loop.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Local};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::monitor::{Monitor, ScanOutcome};

/// Process-wide "should the loop keep going" flag.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Clone, Debug)]
pub struct ControllerStatus {
    pub running: bool,
    pub cursor: usize,
    pub api_calls: u64,
    pub last_poll: Option<DateTime<Local>>,
    pub recipients: usize,
    pub poll_interval: Duration,
}

/// Owns the run flag and the handle of the (single) poll loop task.
pub struct Controller {
    monitor: Arc<Monitor>,
    run_state: Arc<RunState>,
    // Flag and token change together under this lock.
    stop_token: std::sync::Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            run_state: Arc::new(RunState::default()),
            stop_token: std::sync::Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    /// Spawn the poll loop unless it is already running.
    ///
    /// A loop that was stopped but is still finishing its last iteration is
    /// awaited first, so two loops never overlap.
    pub async fn start(&self) -> StartOutcome {
        let mut task = self.task.lock().await;
        if self.run_state.is_running() {
            tracing::info!("Start requested but the monitor is already running");
            return StartOutcome::AlreadyRunning;
        }

        if let Some(prev) = task.take() {
            if let Err(e) = prev.await {
                tracing::warn!(error = %e, "Previous monitor task ended abnormally");
            }
        }

        let stop = CancellationToken::new();
        {
            let mut token = self
                .stop_token
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.run_state.running.store(true, Ordering::SeqCst);
            *token = Some(stop.clone());
        }

        let monitor = self.monitor.clone();
        let run_state = self.run_state.clone();
        *task = Some(tokio::spawn(monitor.run(run_state, stop)));
        tracing::info!("Bot started");
        StartOutcome::Started
    }

    /// Ask the loop to stop. Returns whether it was running.
    ///
    /// The current iteration is not interrupted; use [`Controller::wait_stopped`]
    /// to observe the task actually finishing.
    pub fn stop(&self) -> bool {
        let token = self
            .stop_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let was_running = self.run_state.running.swap(false, Ordering::SeqCst);
        if let Some(tok) = token.as_ref() {
            tok.cancel();
        }
        if was_running {
            tracing::info!("Bot stopped");
        }
        was_running
    }

    /// Wait until the loop task (if any) has exited.
    pub async fn wait_stopped(&self) {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_mut() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Monitor task ended abnormally");
            }
        }
        *task = None;
    }

    /// Re-send the latest rows now, whether or not the loop is running.
    pub async fn force_scan(&self) -> ScanOutcome {
        tracing::info!("Force scan requested");
        self.monitor.force_scan().await
    }

    /// Snapshot for the control panel. Does not wait for an in-flight poll.
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            running: self.is_running(),
            cursor: self.monitor.cursor(),
            api_calls: self.monitor.api_calls(),
            last_poll: self.monitor.last_poll(),
            recipients: self.monitor.recipients().len(),
            poll_interval: self.monitor.settings().poll_interval,
        }
    }
}
