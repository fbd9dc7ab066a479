//! Worksheet polling: row-count diffing, new-row fan-out and force-scan.
//!
//! The monitor owns the `last_row_count` cursor. Only a completed dispatch pass
//! advances it; a shrinking sheet pulls it down without notifying anyone.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Local};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::Backoff,
    controller::RunState,
    dispatch::{DeliveryReport, Dispatcher},
    domain::{ChatId, HeaderSet, Row},
    formatting::{render_both, Banner},
    source::SheetSource,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// How many trailing rows a force-scan re-sends.
    pub force_scan_rows: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            force_scan_rows: 3,
        }
    }
}

/// Result of comparing the cursor against a fresh row count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowChange {
    /// Data rows `from+1 ..= to` are new.
    Appended { from: usize, to: usize },
    /// Rows were removed upstream; the cursor must drop to `to`.
    Shrunk { to: usize },
    Unchanged,
}

pub fn detect_change(last_row_count: usize, current_row_count: usize) -> RowChange {
    use std::cmp::Ordering;
    match current_row_count.cmp(&last_row_count) {
        Ordering::Greater => RowChange::Appended {
            from: last_row_count,
            to: current_row_count,
        },
        Ordering::Less => RowChange::Shrunk {
            to: current_row_count,
        },
        Ordering::Equal => RowChange::Unchanged,
    }
}

/// Number of data rows in a snapshot (the header row does not count).
pub fn data_row_count(snapshot: &[Row]) -> usize {
    snapshot.len().saturating_sub(1)
}

/// The last `n` data rows of a snapshot, or every data row if there are fewer.
pub fn recent_rows(snapshot: &[Row], n: usize) -> &[Row] {
    let data = snapshot.get(1..).unwrap_or_default();
    &data[data.len().saturating_sub(n)..]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Appended {
        rows: usize,
        cursor: usize,
        report: DeliveryReport,
    },
    Resynced {
        from: usize,
        to: usize,
    },
    Unchanged {
        cursor: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Sent { rows: usize, report: DeliveryReport },
    /// The scan failed; an error notice went to every recipient instead.
    Failed { error: String },
}

pub struct Monitor {
    source: Arc<dyn SheetSource>,
    backoff: Arc<Backoff>,
    dispatcher: Dispatcher,
    recipients: Vec<ChatId>,
    settings: MonitorSettings,
    headers: OnceCell<HeaderSet>,
    cursor: Mutex<usize>,
    // Last committed cursor, readable while a poll holds `cursor`.
    published_cursor: AtomicUsize,
    last_poll: std::sync::Mutex<Option<DateTime<Local>>>,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn SheetSource>,
        backoff: Arc<Backoff>,
        dispatcher: Dispatcher,
        recipients: Vec<ChatId>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            source,
            backoff,
            dispatcher,
            recipients,
            settings,
            headers: OnceCell::new(),
            cursor: Mutex::new(0),
            published_cursor: AtomicUsize::new(0),
            last_poll: std::sync::Mutex::new(None),
        }
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    pub fn recipients(&self) -> &[ChatId] {
        &self.recipients
    }

    pub fn api_calls(&self) -> u64 {
        self.backoff.api_calls()
    }

    /// Cursor as of the last completed step. Never waits on a running poll.
    pub fn cursor(&self) -> usize {
        self.published_cursor.load(Ordering::SeqCst)
    }

    fn commit_cursor(&self, cursor: &mut usize, value: usize) {
        *cursor = value;
        self.published_cursor.store(value, Ordering::SeqCst);
    }

    pub fn last_poll(&self) -> Option<DateTime<Local>> {
        self.last_poll.lock().ok().and_then(|g| *g)
    }

    /// Cached header row, fetched on first use.
    ///
    /// An empty header row is returned but not cached, so a sheet that gets its
    /// header later is picked up.
    pub async fn headers(&self) -> Result<HeaderSet> {
        if let Some(h) = self.headers.get() {
            return Ok(h.clone());
        }

        let names = self
            .backoff
            .execute("fetch_header_row", || self.source.fetch_header_row())
            .await?;
        let headers = HeaderSet::new(names);
        if headers.is_empty() {
            return Ok(headers);
        }

        if self.headers.set(headers.clone()).is_ok() {
            tracing::info!(columns = headers.len(), "Headers initialized");
        }
        Ok(headers)
    }

    async fn fetch_snapshot(&self) -> Result<Vec<Row>> {
        let rows = self
            .backoff
            .execute("fetch_all_rows", || self.source.fetch_all_rows())
            .await?;
        if let Ok(mut last) = self.last_poll.lock() {
            *last = Some(Local::now());
        }
        Ok(rows)
    }

    /// Move the cursor to the current row count without notifying anyone.
    pub async fn skip_existing_rows(&self) -> Result<usize> {
        let mut cursor = self.cursor.lock().await;
        let snapshot = self.fetch_snapshot().await?;
        self.commit_cursor(&mut cursor, data_row_count(&snapshot));
        tracing::info!(cursor = *cursor, "Skipping existing rows");
        Ok(*cursor)
    }

    /// One Polling step: fetch, diff against the cursor, fan out new rows.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let mut cursor = self.cursor.lock().await;
        tracing::info!("Checking for new entries...");

        let headers = self.headers().await?;
        let snapshot = self.fetch_snapshot().await?;
        let current = data_row_count(&snapshot);

        match detect_change(*cursor, current) {
            RowChange::Appended { from, to } => {
                let mut report = DeliveryReport::default();
                for row in &snapshot[from + 1..=to] {
                    let rendered = render_both(Banner::NewEntry, row, &headers);
                    report.merge(self.dispatcher.broadcast(&self.recipients, &rendered).await);
                }
                self.commit_cursor(&mut cursor, to);
                tracing::info!(
                    rows = to - from,
                    cursor = to,
                    delivered = report.delivered,
                    skipped = report.skipped,
                    failed = report.failed,
                    api_calls = self.api_calls(),
                    "Sent new rows"
                );
                Ok(PollOutcome::Appended {
                    rows: to - from,
                    cursor: to,
                    report,
                })
            }
            RowChange::Shrunk { to } => {
                let from = *cursor;
                self.commit_cursor(&mut cursor, to);
                tracing::warn!(from, to, "Rows deleted upstream, resetting cursor");
                Ok(PollOutcome::Resynced { from, to })
            }
            RowChange::Unchanged => {
                tracing::info!(cursor = *cursor, api_calls = self.api_calls(), "No new data");
                Ok(PollOutcome::Unchanged { cursor: *cursor })
            }
        }
    }

    /// Re-send the most recent rows to everyone. Never touches the cursor.
    pub async fn force_scan(&self) -> ScanOutcome {
        match self.scan_recent().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Force scan failed");
                let notice = format!("Force scan error: {e}");
                self.dispatcher
                    .broadcast_text(&self.recipients, &notice)
                    .await;
                ScanOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn scan_recent(&self) -> Result<ScanOutcome> {
        let headers = self.headers().await?;
        let snapshot = self.fetch_snapshot().await?;
        let rows = recent_rows(&snapshot, self.settings.force_scan_rows);

        let mut report = DeliveryReport::default();
        for row in rows {
            let rendered = render_both(Banner::RecentEntry, row, &headers);
            report.merge(self.dispatcher.broadcast(&self.recipients, &rendered).await);
        }
        tracing::info!(rows = rows.len(), delivered = report.delivered, "Force scan done");
        Ok(ScanOutcome::Sent {
            rows: rows.len(),
            report,
        })
    }

    /// The poll loop. Polls, then sleeps `poll_interval`, until stopped.
    ///
    /// `stop` wakes the sleep early; an iteration already running always
    /// finishes first.
    pub async fn run(self: Arc<Self>, run_state: Arc<RunState>, stop: CancellationToken) {
        tracing::info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            recipients = self.recipients.len(),
            "Sheet monitor started"
        );

        loop {
            if let Err(e) = self.poll_once().await {
                tracing::error!(error = %e, "Error in sheet monitor");
            }

            tokio::select! {
                _ = stop.cancelled() => {}
                _ = sleep(self.settings.poll_interval) => {}
            }

            if stop.is_cancelled() || !run_state.is_running() {
                break;
            }
        }

        tracing::info!("Sheet monitor stopped");
    }
}
