//! Dead-letter reporting for records the task gave up on. Reporting is best-effort: nothing in
//! here ever returns an error to the delivery path.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::Result;
use crate::error::{CapabilityError, Error};
use crate::message::SinkRecord;

/// Reporting facility offered by the host platform.
pub trait ErrantRecordReporter: Send + Sync {
    /// Hand over a record that could not be written. Failures are reported back so the caller can
    /// log them, they are never propagated further.
    fn report(&self, record: &SinkRecord, cause: &Error) -> Result<()>;
}

/// What the host platform exposes to a running task.
pub trait SinkTaskContext: Send + Sync {
    /// Returns the platform's errant record reporter, `Ok(None)` when none is configured, and
    /// [CapabilityError::Unsupported] when the platform is too old to offer one.
    fn errant_record_reporter(
        &self,
    ) -> std::result::Result<Option<Arc<dyn ErrantRecordReporter>>, CapabilityError>;
}

/// The reporter used by the task. Either the platform provided one, or nothing happens.
#[derive(Clone, Default)]
pub enum ErrorReporter {
    #[default]
    Null,
    Platform(Arc<dyn ErrantRecordReporter>),
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReporter::Null => write!(f, "ErrorReporter::Null"),
            ErrorReporter::Platform(_) => write!(f, "ErrorReporter::Platform"),
        }
    }
}

impl ErrorReporter {
    /// Probe the host context for a reporter. A missing context, an unconfigured reporter and a
    /// platform without the capability all yield [ErrorReporter::Null]; any other probe failure is
    /// returned.
    pub fn from_context(context: Option<&dyn SinkTaskContext>) -> Result<Self> {
        let Some(context) = context else {
            return Ok(ErrorReporter::Null);
        };

        match context.errant_record_reporter() {
            Ok(Some(reporter)) => Ok(ErrorReporter::Platform(reporter)),
            Ok(None) => {
                info!("Errant record reporter not configured.");
                Ok(ErrorReporter::Null)
            }
            Err(CapabilityError::Unsupported) => {
                info!("Platform runtime does not support the errant record reporter.");
                Ok(ErrorReporter::Null)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ErrorReporter::Null)
    }

    /// Report a single record and return whether it was delivered. Never fails, delivery errors
    /// are logged and dropped.
    pub fn report(&self, record: &SinkRecord, cause: &Error) -> bool {
        match self {
            ErrorReporter::Null => false,
            ErrorReporter::Platform(reporter) => match reporter.report(record, cause) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%record, ?e, "Failed to send record to the dead-letter reporter");
                    false
                }
            },
        }
    }
}

/// A record routed to the dead-letter channel with the failure that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrantRecord {
    pub record: SinkRecord,
    pub cause: Error,
    pub reported_at: DateTime<Utc>,
}

/// Bounded in-process dead-letter channel. The sending side never waits: a full or closed channel
/// loses the record.
#[derive(Debug, Clone)]
pub struct DeadLetterChannel {
    tx: mpsc::Sender<ErrantRecord>,
}

impl DeadLetterChannel {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ErrantRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ErrantRecordReporter for DeadLetterChannel {
    fn report(&self, record: &SinkRecord, cause: &Error) -> Result<()> {
        let errant = ErrantRecord {
            record: record.clone(),
            cause: cause.clone(),
            reported_at: Utc::now(),
        };
        self.tx.try_send(errant).map_err(|e| match e {
            TrySendError::Full(_) => Error::DeadLetter("dead-letter channel is full".to_string()),
            TrySendError::Closed(_) => {
                Error::DeadLetter("dead-letter channel is closed".to_string())
            }
        })
    }
}
