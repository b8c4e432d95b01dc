//! The output plugin: batch delivery with bounded retry.
//!
//! [`LogentriesOutput`] is driven by a host framework that hands it one
//! decoded batch per `write` call on a dedicated worker context. Each
//! record resolves to a destination token, is formatted as
//! `"<message> <token>"`, and is pushed through the connection manager.
//! Transient connection failures reset the connection and resend the
//! identical payload after an exponential backoff sleep; once the retry
//! budget is spent the whole batch fails and the host's redelivery
//! policy takes over. Structural problems in a record (not a mapping,
//! no token, no message) never fail the batch; the record is skipped.

use std::{thread, time::Duration};

use log::warn;
use thiserror::Error;

use crate::{
    chunk::{Chunk, ChunkError, Event},
    config::{OutputConfig, RetryPolicy},
    resolver::{CategoryTags, resolve},
    token_table::{TableError, TokenTable},
    transport::{ConnectionManager, LineSink, is_transient},
};

/// Errors that fail a whole batch.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The token table could not be loaded; nothing was sent.
    #[error(transparent)]
    Table(#[from] TableError),
    /// The host-supplied buffer could not be decoded.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    /// Retries were exhausted against a refusing or unreachable endpoint.
    #[error("could not push logs after {retries} retries: {message}")]
    ConnectionFailure { retries: u32, message: String },
    /// A non-transient I/O failure during send.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type SleepFn = Box<dyn Fn(Duration) + Send>;

/// Forwards batches of log records to the remote ingestion endpoint.
pub struct LogentriesOutput {
    config: OutputConfig,
    retry: RetryPolicy,
    connection: ConnectionManager,
    sleep: SleepFn,
}

impl LogentriesOutput {
    /// Build an output from host-supplied configuration.
    pub fn from_config(config: OutputConfig) -> Self {
        let connection = ConnectionManager::from_config(&config);
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        };
        Self {
            config,
            retry,
            connection,
            sleep: Box::new(thread::sleep),
        }
    }

    pub(crate) fn with_parts(
        config: OutputConfig,
        retry: RetryPolicy,
        connection: ConnectionManager,
        sleep: SleepFn,
    ) -> Self {
        Self {
            config,
            retry,
            connection,
            sleep,
        }
    }

    /// Host lifecycle hook invoked before the first batch.
    pub fn start(&mut self) {}

    /// Host lifecycle hook invoked on teardown; drops the connection.
    pub fn shutdown(&mut self) {
        self.connection.reset();
    }

    /// Deliver one decoded batch, in order.
    ///
    /// The token table is re-read on every call so operator edits take
    /// effect at the next batch. A load failure aborts the batch before
    /// any record is sent.
    pub fn write(&mut self, events: &[Event]) -> Result<(), DeliveryError> {
        let table = TokenTable::load(&self.config.path)?;
        let tags = CategoryTags {
            access: &self.config.tag_access_log,
            error: &self.config.tag_error_log,
        };
        for event in events {
            if !event.record.is_object() {
                continue;
            }
            let Some(token) = resolve(&event.tag, &event.record, &table, &tags) else {
                continue;
            };
            let Some(message) = event.record.get("message").and_then(|m| m.as_str()) else {
                continue;
            };
            let payload = format!("{message} {token}");
            send_with_retry(&mut self.connection, &self.retry, &self.sleep, &payload)?;
        }
        Ok(())
    }

    /// Decode a host-buffered chunk and deliver it.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<(), DeliveryError> {
        let events = chunk.events()?;
        self.write(&events)
    }
}

impl std::fmt::Debug for LogentriesOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogentriesOutput")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("connection", &self.connection)
            .finish()
    }
}

/// Send `payload` through `sink`, retrying transient failures.
///
/// Retry `n` is preceded by a connection reset, a warning carrying the
/// underlying error, and a backoff sleep of `base * factor^n`. The same
/// payload string is resent verbatim on every attempt. Non-transient
/// errors propagate immediately.
fn send_with_retry<S: LineSink + ?Sized>(
    sink: &mut S,
    policy: &RetryPolicy,
    sleep: &SleepFn,
    payload: &str,
) -> Result<(), DeliveryError> {
    let mut retries = 0u32;
    loop {
        match sink.send_line(payload) {
            Ok(()) => return Ok(()),
            Err(err) if is_transient(&err) => {
                if retries >= policy.max_retries {
                    return Err(DeliveryError::ConnectionFailure {
                        retries,
                        message: err.to_string(),
                    });
                }
                retries += 1;
                sink.reset();
                warn!("could not push logs, resetting connection and trying again: {err}");
                sleep(policy.delay(retries));
            }
            Err(err) => return Err(DeliveryError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use rstest::rstest;

    use super::{DeliveryError, SleepFn, send_with_retry};
    use crate::{config::RetryPolicy, transport::LineSink};

    /// Scripted sink: fails with the queued error kinds, then succeeds.
    struct ScriptedSink {
        failures: Vec<io::ErrorKind>,
        attempts: Vec<String>,
        resets: u32,
    }

    impl ScriptedSink {
        fn new(failures: &[io::ErrorKind]) -> Self {
            Self {
                failures: failures.to_vec(),
                attempts: Vec::new(),
                resets: 0,
            }
        }
    }

    impl LineSink for ScriptedSink {
        fn send_line(&mut self, line: &str) -> io::Result<()> {
            self.attempts.push(line.to_owned());
            if self.failures.is_empty() {
                return Ok(());
            }
            let kind = self.failures.remove(0);
            Err(io::Error::new(kind, "scripted failure"))
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn recording_sleep() -> (SleepFn, Arc<Mutex<Vec<Duration>>>) {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&slept);
        let sleep: SleepFn = Box::new(move |d| handle.lock().unwrap().push(d));
        (sleep, slept)
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base: Duration::from_millis(1),
            factor: 5,
        }
    }

    #[rstest]
    fn first_attempt_success_needs_no_retry() {
        let mut sink = ScriptedSink::new(&[]);
        let (sleep, slept) = recording_sleep();
        send_with_retry(&mut sink, &fast_policy(3), &sleep, "hello TOKENA")
            .expect("send succeeds");
        assert_eq!(sink.attempts, vec!["hello TOKENA"]);
        assert_eq!(sink.resets, 0);
        assert!(slept.lock().unwrap().is_empty());
    }

    #[rstest]
    fn exhausted_retries_fail_after_n_plus_one_attempts() {
        let refused = [io::ErrorKind::ConnectionRefused; 5];
        let mut sink = ScriptedSink::new(&refused);
        let (sleep, slept) = recording_sleep();
        let err = send_with_retry(&mut sink, &fast_policy(3), &sleep, "payload")
            .expect_err("retries must exhaust");

        assert!(
            matches!(err, DeliveryError::ConnectionFailure { retries: 3, .. }),
            "unexpected error: {err:?}"
        );
        assert_eq!(sink.attempts.len(), 4, "1 initial + 3 retries");
        assert_eq!(sink.resets, 3, "connection reset before every retry");
        assert_eq!(
            *slept.lock().unwrap(),
            vec![
                Duration::from_millis(5),
                Duration::from_millis(25),
                Duration::from_millis(125),
            ]
        );
    }

    #[rstest]
    fn recovers_after_two_transient_failures() {
        let mut sink = ScriptedSink::new(&[
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::TimedOut,
        ]);
        let (sleep, slept) = recording_sleep();
        send_with_retry(&mut sink, &fast_policy(3), &sleep, "hello TOKENA")
            .expect("third attempt succeeds");

        assert_eq!(sink.attempts.len(), 3);
        assert!(
            sink.attempts.iter().all(|line| line == "hello TOKENA"),
            "identical payload must be resent verbatim"
        );
        assert_eq!(sink.resets, 2);
        assert_eq!(slept.lock().unwrap().len(), 2);
    }

    #[rstest]
    fn non_transient_error_is_fatal_immediately() {
        let mut sink = ScriptedSink::new(&[io::ErrorKind::BrokenPipe]);
        let (sleep, slept) = recording_sleep();
        let err = send_with_retry(&mut sink, &fast_policy(3), &sleep, "payload")
            .expect_err("broken pipe must be fatal");

        assert!(matches!(err, DeliveryError::Io(_)), "unexpected error: {err:?}");
        assert_eq!(sink.attempts.len(), 1);
        assert_eq!(sink.resets, 0);
        assert!(slept.lock().unwrap().is_empty());
    }

    #[rstest]
    fn zero_retry_budget_fails_on_first_transient_error() {
        let mut sink = ScriptedSink::new(&[io::ErrorKind::ConnectionRefused]);
        let (sleep, _slept) = recording_sleep();
        let err = send_with_retry(&mut sink, &fast_policy(0), &sleep, "payload")
            .expect_err("no retries allowed");
        assert!(matches!(
            err,
            DeliveryError::ConnectionFailure { retries: 0, .. }
        ));
        assert_eq!(sink.attempts.len(), 1);
    }
}
