//! [SinkTask] receives the batches delivered by the host platform and hands them to the
//! [SinkEngine]. When the engine fails a batch, the task either returns the failure to the host
//! (`errors.tolerance=none`) or counts it, sends every record of the batch to the dead-letter
//! reporter and carries on (`errors.tolerance=all`).
//!
//! The host delivers at most one batch at a time per task and never calls `stop` while a `put` is
//! in flight. All lifecycle methods take `&mut self`, the task does no locking of its own. The
//! statistics are the only state shared with other threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use crate::Result;
use crate::config::SinkConfig;
use crate::engine::{SinkEngine, SinkEngineBuilder};
use crate::error::Error;
use crate::instance::next_task_id;
use crate::message::{SinkRecord, TopicPartition};
use crate::reporter::{ErrorReporter, SinkTaskContext};
use crate::statistics::{
    ConnectorStatistics, register_statistics, statistics_name, unregister_statistics,
};

/// Lifecycle of a task. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Created => write!(f, "created"),
            Lifecycle::Started => write!(f, "started"),
            Lifecycle::Stopped => write!(f, "stopped"),
        }
    }
}

enum State<E> {
    Created,
    Started(Running<E>),
    Stopped,
}

struct Running<E> {
    config: SinkConfig,
    engine: E,
}

/// A failed `put`, alive only while the failure is being routed.
struct FailureEvent<'a> {
    cause: Error,
    records: &'a [SinkRecord],
    tolerant: bool,
}

pub struct SinkTask<B: SinkEngineBuilder> {
    id: u32,
    builder: B,
    context: Option<Arc<dyn SinkTaskContext>>,
    error_reporter: ErrorReporter,
    statistics: Option<Arc<ConnectorStatistics>>,
    state: State<B::Engine>,
}

impl<B: SinkEngineBuilder> SinkTask<B> {
    /// Creates a task that will build its engine with `builder` on start. The task id is assigned
    /// here, once.
    pub fn new(builder: B) -> Self {
        Self {
            id: next_task_id(),
            builder,
            context: None,
            error_reporter: ErrorReporter::Null,
            statistics: None,
            state: State::Created,
        }
    }

    /// Attach the host context, probed on start for a dead-letter reporter.
    pub fn with_context(mut self, context: Arc<dyn SinkTaskContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn version(&self) -> &'static str {
        crate::version()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Name the task's statistics are registered under.
    pub fn statistics_name(&self) -> String {
        statistics_name(self.id)
    }

    /// The task's statistics, available once it has been started.
    pub fn statistics(&self) -> Option<Arc<ConnectorStatistics>> {
        self.statistics.as_ref().map(Arc::clone)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.state {
            State::Created => Lifecycle::Created,
            State::Started(_) => Lifecycle::Started,
            State::Stopped => Lifecycle::Stopped,
        }
    }

    /// Replace the dead-letter reporter. A later `start` probes the context again and overwrites it.
    pub fn set_error_reporter(&mut self, error_reporter: ErrorReporter) {
        self.error_reporter = error_reporter;
    }

    /// Parse the configuration, set up the dead-letter reporter, build the engine and register
    /// the statistics. Any error leaves the task in [Lifecycle::Created] with no engine running.
    pub fn start(&mut self, props: HashMap<String, String>) -> Result<()> {
        if !matches!(self.state, State::Created) {
            return Err(Error::Lifecycle(format!(
                "task {} cannot be started, it is {}",
                self.id,
                self.lifecycle()
            )));
        }
        info!(task_id = self.id, "Starting sink task");

        let config = SinkConfig::load(props)?;
        let error_reporter = ErrorReporter::from_context(self.context.as_deref())?;
        let engine = self.builder.build(&config)?;

        let statistics = register_statistics(&self.statistics_name());

        info!(
            task_id = self.id,
            errors_tolerance = %config.errors_tolerance,
            dead_letter = !error_reporter.is_null(),
            statistics = %self.statistics_name(),
            "Sink task started"
        );

        self.error_reporter = error_reporter;
        self.statistics = Some(statistics);
        self.state = State::Started(Running { config, engine });
        Ok(())
    }

    /// Write a batch. An empty batch is a no-op. In strict mode the engine's error is returned
    /// unchanged, in tolerant mode it is absorbed after routing the batch to the dead-letter
    /// reporter.
    pub async fn put(&mut self, records: Vec<SinkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let State::Started(running) = &mut self.state else {
            return Err(Error::Lifecycle(format!(
                "task {} cannot accept records, it is {}",
                self.id,
                self.lifecycle()
            )));
        };

        let put_start = Instant::now();
        match running.engine.put(&records).await {
            Ok(()) => {
                let elapsed_ms =
                    u64::try_from(put_start.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(
                    task_id = self.id,
                    records = records.len(),
                    elapsed_ms,
                    "Put records"
                );
                Ok(())
            }
            Err(cause) => {
                let event = FailureEvent {
                    cause,
                    records: &records,
                    tolerant: running.config.is_errors_tolerance(),
                };
                self.handle_failure(event)
            }
        }
    }

    /// The whole batch counts as failed, the task has no view of which record broke it.
    fn handle_failure(&self, event: FailureEvent<'_>) -> Result<()> {
        trace!(task_id = self.id, "Passing the failure to the failure handler.");

        if !event.tolerant {
            self.record_failure(event.records.len(), 0);
            error!(
                task_id = self.id,
                records = event.records.len(),
                kind = event.cause.kind(),
                cause = %event.cause,
                "Failed to write records"
            );
            return Err(event.cause);
        }

        let delivered = event
            .records
            .iter()
            .filter(|record| self.error_reporter.report(record, &event.cause))
            .count();
        self.record_failure(event.records.len(), delivered);

        warn!(
            task_id = self.id,
            records = event.records.len(),
            kind = event.cause.kind(),
            cause = %event.cause,
            dead_lettered = delivered,
            "Failed to write records, skipping the batch"
        );
        Ok(())
    }

    fn record_failure(&self, records: usize, dead_lettered: usize) {
        if let Some(statistics) = &self.statistics {
            statistics.record_failure(records, dead_lettered);
        }
    }

    /// Offsets are tracked and committed by the platform, nothing to do here.
    pub fn flush(&mut self, offsets: &HashMap<TopicPartition, i64>) {
        trace!(
            task_id = self.id,
            partitions = offsets.len(),
            "Flush requested"
        );
    }

    /// Stop the engine and unregister the statistics, [SinkTask::statistics] keeps the final
    /// values. Safe to call before `start` or more than once.
    pub async fn stop(&mut self) {
        let State::Started(running) = &mut self.state else {
            debug!(task_id = self.id, lifecycle = %self.lifecycle(), "Task is not running");
            return;
        };

        running.engine.stop().await;
        self.state = State::Stopped;
        unregister_statistics(&self.statistics_name());
        info!(task_id = self.id, "Sink task stopped");
    }
}

impl<B: SinkEngineBuilder> Drop for SinkTask<B> {
    fn drop(&mut self) {
        if matches!(self.state, State::Started(_)) {
            unregister_statistics(&self.statistics_name());
        }
    }
}
