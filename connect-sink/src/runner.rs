//! Drives a single [SinkTask] from a stream of JSON-lines records, standing in for the host
//! platform: it starts the task, delivers batches, flushes the last offsets and stops the task.
//! Records the task gives up on arrive on a dead-letter channel and are logged.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use connect_sink_core::reporter::DeadLetterChannel;
use connect_sink_core::statistics::encode_statistics;
use connect_sink_core::{
    CapabilityError, ErrantRecordReporter, Error, Result, SinkEngineBuilder, SinkRecord, SinkTask,
    SinkTaskContext, TopicPartition,
};

use crate::cmdline::Settings;

/// A record as read from the input, one JSON object per line.
#[derive(Debug, Deserialize)]
struct InputRecord {
    topic: String,
    #[serde(default)]
    partition: i32,
    offset: i64,
    #[serde(default)]
    key: Option<String>,
    value: serde_json::Value,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl From<InputRecord> for SinkRecord {
    fn from(input: InputRecord) -> Self {
        let value = match input.value {
            serde_json::Value::String(s) => Bytes::from(s),
            other => Bytes::from(other.to_string()),
        };
        SinkRecord {
            topic: input.topic.into(),
            partition: input.partition,
            offset: input.offset,
            key: input.key.map(Bytes::from),
            value,
            timestamp: input.timestamp,
            headers: Arc::new(input.headers),
        }
    }
}

/// Host context offering the dead-letter channel as errant record reporter.
struct RunnerContext {
    dead_letter: DeadLetterChannel,
}

impl SinkTaskContext for RunnerContext {
    fn errant_record_reporter(
        &self,
    ) -> std::result::Result<Option<Arc<dyn ErrantRecordReporter>>, CapabilityError> {
        Ok(Some(Arc::new(self.dead_letter.clone())))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Summary {
    pub(crate) records: u64,
    pub(crate) batches: u64,
    pub(crate) skipped_lines: u64,
    pub(crate) dead_lettered: u64,
    /// Text exposition of the task's statistics, captured before the task unregisters them.
    pub(crate) statistics: Option<String>,
}

pub(crate) async fn run<B, R>(builder: B, settings: &Settings, input: R) -> Result<Summary>
where
    B: SinkEngineBuilder,
    R: AsyncBufRead + Unpin,
{
    let (dead_letter, mut dead_letters) = DeadLetterChannel::new(settings.dead_letter_capacity);
    let drain = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(errant) = dead_letters.recv().await {
            count += 1;
            warn!(
                record = %errant.record,
                cause = %errant.cause,
                reported_at = %errant.reported_at,
                "Dead-lettered record"
            );
        }
        count
    });

    let mut task = SinkTask::new(builder).with_context(Arc::new(RunnerContext { dead_letter }));
    task.start(settings.props.clone())?;

    let mut summary = Summary::default();
    let result = forward(&mut task, settings.batch_size, input, &mut summary).await;
    if settings.print_statistics {
        summary.statistics = Some(encode_statistics()?);
    }
    task.stop().await;
    // the task owns the last sender of the dead-letter channel
    drop(task);

    summary.dead_lettered = drain
        .await
        .map_err(|e| Error::DeadLetter(format!("dead-letter drain failed: {e}")))?;
    result?;

    info!(
        records = summary.records,
        batches = summary.batches,
        skipped_lines = summary.skipped_lines,
        dead_lettered = summary.dead_lettered,
        "Input exhausted"
    );
    Ok(summary)
}

async fn forward<B, R>(
    task: &mut SinkTask<B>,
    batch_size: usize,
    input: R,
    summary: &mut Summary,
) -> Result<()>
where
    B: SinkEngineBuilder,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut batch = Vec::with_capacity(batch_size);
    let mut offsets: HashMap<TopicPartition, i64> = HashMap::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::Connection(format!("Failed to read input: {e}")))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let record: SinkRecord = match serde_json::from_str::<InputRecord>(&line) {
            Ok(input) => input.into(),
            Err(e) => {
                summary.skipped_lines += 1;
                warn!(?e, "Skipping malformed input line");
                continue;
            }
        };
        offsets
            .entry(record.topic_partition())
            .and_modify(|next| *next = (*next).max(record.offset.saturating_add(1)))
            .or_insert(record.offset.saturating_add(1));
        batch.push(record);

        if batch.len() >= batch_size {
            let records = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            put_batch(task, records, summary).await?;
        }
    }

    put_batch(task, batch, summary).await?;
    task.flush(&offsets);
    Ok(())
}

async fn put_batch<B: SinkEngineBuilder>(
    task: &mut SinkTask<B>,
    records: Vec<SinkRecord>,
    summary: &mut Summary,
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    summary.records += records.len() as u64;
    summary.batches += 1;
    task.put(records).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use connect_sink_core::SinkEngine;
    use connect_sink_core::config::SinkConfig;
    use connect_sink_core::engine::BuiltinEngineBuilder;

    const INPUT: &str = r#"{"topic":"orders","partition":0,"offset":0,"value":"first"}
{"topic":"orders","partition":0,"offset":1,"value":{"id":2}}

not json
{"topic":"orders","partition":1,"offset":7,"key":"k","value":"third","headers":{"h":"v"}}
"#;

    struct FailingEngine;

    impl SinkEngine for FailingEngine {
        async fn put(&mut self, _records: &[SinkRecord]) -> Result<()> {
            Err(Error::Write("disk full".to_string()))
        }

        async fn stop(&mut self) {}
    }

    fn failing(_: &SinkConfig) -> Result<FailingEngine> {
        Ok(FailingEngine)
    }

    fn settings(pairs: &[(&str, &str)], batch_size: usize) -> Settings {
        Settings {
            props: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            batch_size,
            dead_letter_capacity: 100,
            print_statistics: false,
        }
    }

    #[test]
    fn test_input_record_conversion() {
        let input: InputRecord = serde_json::from_str(
            r#"{"topic":"t","offset":3,"value":{"a":1},"timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let record = SinkRecord::from(input);
        assert_eq!(record.to_string(), "t-0@3");
        assert_eq!(record.value, Bytes::from_static(br#"{"a":1}"#));
        assert!(record.key.is_none());
        assert!(record.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_run_blackhole() {
        let settings = settings(&[("sink.type", "blackhole")], 2);
        let summary = run(BuiltinEngineBuilder, &settings, INPUT.as_bytes())
            .await
            .unwrap();

        assert_eq!(
            summary,
            Summary {
                records: 3,
                batches: 2,
                skipped_lines: 1,
                dead_lettered: 0,
                statistics: None,
            }
        );
    }

    #[tokio::test]
    async fn test_run_tolerant_failures() {
        let settings = settings(&[("errors.tolerance", "all")], 2);
        let summary = run(failing, &settings, INPUT.as_bytes()).await.unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.dead_lettered, 3);
    }

    #[tokio::test]
    async fn test_run_prints_statistics() {
        let mut settings = settings(&[("errors.tolerance", "all")], 10);
        settings.print_statistics = true;
        let summary = run(failing, &settings, INPUT.as_bytes()).await.unwrap();

        let statistics = summary.statistics.unwrap();
        assert!(statistics.lines().any(|l| {
            l.starts_with("connect_sink_dead_lettered_records_total{") && l.ends_with(" 3")
        }));
    }

    #[tokio::test]
    async fn test_run_last_offset() {
        let input = r#"{"topic":"t","offset":9223372036854775807,"value":"v"}"#;
        let settings = settings(&[("sink.type", "blackhole")], 10);
        let summary = run(BuiltinEngineBuilder, &settings, input.as_bytes())
            .await
            .unwrap();
        assert_eq!(summary.records, 1);
    }

    #[tokio::test]
    async fn test_run_strict_failure() {
        let settings = settings(&[("errors.tolerance", "none")], 2);
        let result = run(failing, &settings, INPUT.as_bytes()).await;
        assert_eq!(result, Err(Error::Write("disk full".to_string())));
    }

    #[tokio::test]
    async fn test_run_unknown_engine() {
        let settings = settings(&[("sink.type", "nowhere")], 2);
        let result = run(BuiltinEngineBuilder, &settings, INPUT.as_bytes()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
