//! The interceptor: line buffering, emission and fan-out under one lock

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use super::line_buffer::LineBuffer;
use super::log_file::{LogFile, LogMode};
use super::record;
use super::subscribers::{
    BroadcastSummary, SubscriberId, SubscriberRegistry, Subscription, DEFAULT_SUBSCRIBER_CAPACITY,
};
use crate::config::Config;
use crate::error::TeeError;

/// Settings for building an [`Interceptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeeOptions {
    /// Log file receiving every record
    pub log_file: PathBuf,
    /// Append to or truncate an existing log file
    pub log_mode: LogMode,
    /// Queue capacity of each subscriber channel
    pub subscriber_capacity: usize,
}

impl TeeOptions {
    /// Options with defaults for everything but the log file
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            log_mode: LogMode::default(),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl From<&Config> for TeeOptions {
    fn from(config: &Config) -> Self {
        Self {
            log_file: config.resolved_log_file(),
            log_mode: config.log_mode,
            subscriber_capacity: config.subscriber_capacity,
        }
    }
}

/// Original console plus log file; gone once the interceptor is closed
struct Sinks {
    console: Box<dyn Write + Send>,
    log: LogFile,
}

impl Sinks {
    fn emit(&mut self, record: &str) -> Result<(), TeeError> {
        self.console
            .write_all(record.as_bytes())
            .and_then(|()| self.console.flush())
            .map_err(TeeError::Console)?;
        self.log.write_record(record)
    }

    fn flush(&mut self) -> Result<(), TeeError> {
        self.console.flush().map_err(TeeError::Console)?;
        self.log.flush()
    }
}

struct TeeState {
    pending: LineBuffer,
    sinks: Option<Sinks>,
    subscribers: SubscriberRegistry,
}

impl TeeState {
    fn sinks(&mut self) -> Result<&mut Sinks, TeeError> {
        self.sinks.as_mut().ok_or(TeeError::Closed)
    }

    /// Stamp, mirror, persist and broadcast one line
    fn emit_line(&mut self, line: &str, summary: &mut BroadcastSummary) -> Result<(), TeeError> {
        let record = record::stamp(line);
        self.sinks()?.emit(&record)?;
        *summary += self.subscribers.broadcast(&record);
        Ok(())
    }

    fn flush(&mut self, summary: &mut BroadcastSummary) -> Result<(), TeeError> {
        // Fail before touching the buffer so a closed tee keeps nothing half-emitted
        self.sinks()?;
        if let Some(rest) = self.pending.remainder() {
            let line = rest.trim();
            if !line.is_empty() {
                self.emit_line(line, summary)?;
            }
            self.pending.clear();
        }
        self.sinks()?.flush()
    }
}

/// Tees written text into timestamped records
///
/// Every complete, non-blank line is stamped, written to the original console
/// sink, appended to the log file and offered to every subscriber. All of that
/// happens under one lock, so lines from concurrent writers never interleave.
///
/// The interceptor itself does not touch the process's stdout; it is handed
/// the sink to mirror to. See [`StdoutTee`](crate::redirect::StdoutTee) for
/// the process-wide swap.
pub struct Interceptor {
    state: Mutex<TeeState>,
    log_path: PathBuf,
    subscriber_capacity: usize,
}

impl Interceptor {
    /// Open the log file and start teeing into `console`
    pub fn new(options: &TeeOptions, console: Box<dyn Write + Send>) -> Result<Self, TeeError> {
        let log = LogFile::open(&options.log_file, options.log_mode)?;
        debug!(path = %options.log_file.display(), mode = ?options.log_mode, "Opened tee log file");

        Ok(Self {
            state: Mutex::new(TeeState {
                pending: LineBuffer::new(),
                sinks: Some(Sinks { console, log }),
                subscribers: SubscriberRegistry::new(),
            }),
            log_path: options.log_file.clone(),
            subscriber_capacity: options.subscriber_capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TeeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write text; every completed line is emitted before returning
    pub fn write(&self, data: &str) -> Result<(), TeeError> {
        self.write_bytes(data.as_bytes())
    }

    /// Byte-level [`write`](Self::write); invalid UTF-8 is replaced per line
    pub fn write_bytes(&self, data: &[u8]) -> Result<(), TeeError> {
        let mut summary = BroadcastSummary::default();
        let result = {
            let mut state = self.lock();
            if state.sinks.is_none() {
                return Err(TeeError::Closed);
            }
            state.pending.extend(data);
            // One line at a time: after a sink error the later lines stay pending
            let mut result = Ok(());
            while let Some(line) = state.pending.next_line() {
                if record::is_blank(&line) {
                    continue;
                }
                result = state.emit_line(&line, &mut summary);
                if result.is_err() {
                    break;
                }
            }
            result
        };
        trace_summary(&summary);
        result
    }

    /// Emit any unterminated remainder and flush both sinks
    pub fn flush(&self) -> Result<(), TeeError> {
        let mut summary = BroadcastSummary::default();
        let result = self.lock().flush(&mut summary);
        trace_summary(&summary);
        result
    }

    /// Flush, close the log file and hand back the original console sink
    ///
    /// Later calls to `write`, `flush` or `close` return [`TeeError::Closed`].
    /// Subscribers stay registered but receive nothing further.
    pub fn close(&self) -> Result<Box<dyn Write + Send>, TeeError> {
        let mut summary = BroadcastSummary::default();
        let result = {
            let mut state = self.lock();
            state.flush(&mut summary).and_then(|()| {
                let sinks = state.sinks.take().ok_or(TeeError::Closed)?;
                sinks.log.close()?;
                Ok(sinks.console)
            })
        };
        trace_summary(&summary);
        if result.is_ok() {
            debug!(path = %self.log_path.display(), "Closed tee log file");
        }
        result
    }

    /// Whether [`close`](Self::close) has completed
    pub fn is_closed(&self) -> bool {
        self.lock().sinks.is_none()
    }

    /// Register a new subscriber channel
    ///
    /// The subscriber sees every record emitted from now on; nothing earlier
    /// is replayed. The caller is responsible for calling
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self) -> Subscription {
        let subscription = self.lock().subscribers.subscribe(self.subscriber_capacity);
        debug!(subscriber = %subscription.id(), "Subscriber registered");
        subscription
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().subscribers.unsubscribe(id);
        if removed {
            debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Path of the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn trace_summary(summary: &BroadcastSummary) {
    if summary.dropped() > 0 {
        trace!(
            delivered = summary.delivered,
            dropped_full = summary.dropped_full,
            dropped_closed = summary.dropped_closed,
            "Records dropped for some subscribers"
        );
    }
}
