//! Record-ingestion task of a sink connector. The host platform starts a [SinkTask], delivers
//! batches of [SinkRecord]s to it and finally stops it. Each batch is written by a [SinkEngine];
//! when the engine fails, `errors.tolerance` decides whether the failure stops the pipeline or the
//! batch is sent to the dead-letter [ErrorReporter] and skipped.

pub use crate::error::{CapabilityError, Error, Result};

mod error;

/// Task level configuration parsed from the start properties.
pub mod config;

/// The sink engine contract and the builtin engines.
pub mod engine;

/// Process-wide task instance identifiers.
pub mod instance;

mod message;
pub use crate::message::{SinkRecord, TopicPartition};

/// Dead-letter reporting of records that could not be written.
pub mod reporter;
pub use crate::reporter::{ErrantRecordReporter, ErrorReporter, SinkTaskContext};

pub mod statistics;

mod task;
pub use crate::engine::{SinkEngine, SinkEngineBuilder};
pub use crate::task::{Lifecycle, SinkTask};

/// Version of the connector, reported by every task.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
