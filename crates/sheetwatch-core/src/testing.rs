//! Hand-written fakes for the ports, shared by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Row},
    messaging::{
        port::ChatPort,
        types::{MessageFormat, SendError},
    },
    source::SheetSource,
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: ChatId,
    pub text: String,
    pub format: MessageFormat,
}

/// Records every attempted send; failures are scripted per (recipient, format).
#[derive(Default)]
pub struct FakeChat {
    attempts: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<(i64, MessageFormat), SendError>>,
}

impl FakeChat {
    pub fn fail_on(&self, recipient: i64, format: MessageFormat, err: SendError) {
        self.failures
            .lock()
            .unwrap()
            .insert((recipient, format), err);
    }

    /// Every send attempt, successful or not.
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.attempts.lock().unwrap().clone()
    }

    /// Only the sends that succeeded.
    pub fn sent(&self) -> Vec<SentMessage> {
        let failures = self.failures.lock().unwrap();
        self.attempts()
            .into_iter()
            .filter(|m| !failures.contains_key(&(m.recipient.0, m.format)))
            .collect()
    }

    pub fn sent_to(&self, recipient: i64) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.recipient.0 == recipient)
            .collect()
    }
}

#[async_trait]
impl ChatPort for FakeChat {
    async fn send_message(
        &self,
        recipient: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> std::result::Result<(), SendError> {
        self.attempts.lock().unwrap().push(SentMessage {
            recipient,
            text: text.to_string(),
            format,
        });
        match self.failures.lock().unwrap().get(&(recipient.0, format)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory worksheet. `rows[0]` is the header row.
#[derive(Default)]
pub struct FakeSource {
    rows: Mutex<Vec<Row>>,
    row_errors: Mutex<VecDeque<Error>>,
    latency: Mutex<Duration>,
    header_calls: AtomicUsize,
    rows_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn with_data_rows(headers: &[&str], data_rows: usize) -> Self {
        let source = Self::default();
        source.set_data_rows(headers, data_rows);
        source
    }

    /// Replace the sheet with a header row plus `n` generated data rows.
    pub fn set_data_rows(&self, headers: &[&str], n: usize) {
        let mut rows = vec![headers.iter().map(|s| s.to_string()).collect::<Row>()];
        for i in 1..=n {
            rows.push(
                (0..headers.len())
                    .map(|c| format!("r{i}c{}", c + 1))
                    .collect(),
            );
        }
        *self.rows.lock().unwrap() = rows;
    }

    /// Queue an error for the next `fetch_all_rows` call.
    pub fn fail_next_rows(&self, err: Error) {
        self.row_errors.lock().unwrap().push_back(err);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn header_calls(&self) -> usize {
        self.header_calls.load(Ordering::SeqCst)
    }

    pub fn rows_calls(&self) -> usize {
        self.rows_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SheetSource for FakeSource {
    async fn fetch_header_row(&self) -> Result<Vec<String>> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .first()
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_all_rows(&self) -> Result<Vec<Row>> {
        self.rows_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.row_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Shared buffer usable as a `tracing_subscriber` writer.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
