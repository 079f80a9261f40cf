//! Per-instance failure statistics. The task is the only writer; monitors read the counters from
//! other threads through [lookup_statistics] or the text exposition from [encode_statistics].
//!
//! Every [ConnectorStatistics] is registered under `<namespace>.ConnectorStatistics<id>`, so
//! tasks in the same process never collide.

use std::collections::HashMap;
use std::sync::atomic::AtomicI64;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::Result;

pub const STATISTICS_NAMESPACE: &str = "connect_sink";
const INSTANCE_LABEL: &str = "instance";
const VERSION_LABEL: &str = "version";

// counters (the _total suffix is added by the prometheus client)
const FAILURE_EVENTS_TOTAL: &str = "failure_events";
const FAILED_RECORDS_TOTAL: &str = "failed_records";
const DEAD_LETTERED_RECORDS_TOTAL: &str = "dead_lettered_records";
// gauge
const LAST_FAILURE_TIMESTAMP: &str = "last_failure_timestamp_ms";

/// Name the statistics of task `id` are registered under.
pub fn statistics_name(id: u32) -> String {
    format!("{STATISTICS_NAMESPACE}.ConnectorStatistics{id}")
}

/// Failure counters of a single task instance. Counters only ever go up.
#[derive(Debug, Default)]
pub struct ConnectorStatistics {
    failure_events: Counter,
    failed_records: Counter,
    dead_lettered_records: Counter,
    last_failure_timestamp_ms: Gauge<i64, AtomicI64>,
}

/// Point-in-time copy of [ConnectorStatistics].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatisticsSnapshot {
    /// Number of batches the engine failed to write.
    pub failure_events: u64,
    /// Records contained in those batches.
    pub failed_records: u64,
    /// Records accepted by the dead-letter reporter.
    pub dead_lettered_records: u64,
    pub last_failure: Option<DateTime<Utc>>,
}

impl ConnectorStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one failed batch of `records` records, `dead_lettered` of which were accepted
    /// by the dead-letter reporter.
    pub(crate) fn record_failure(&self, records: usize, dead_lettered: usize) {
        self.failure_events.inc();
        self.failed_records.inc_by(records as u64);
        if dead_lettered > 0 {
            self.dead_lettered_records.inc_by(dead_lettered as u64);
        }
        self.last_failure_timestamp_ms
            .set(Utc::now().timestamp_millis());
    }

    pub fn failure_events(&self) -> u64 {
        self.failure_events.get()
    }

    pub fn failed_records(&self) -> u64 {
        self.failed_records.get()
    }

    pub fn dead_lettered_records(&self) -> u64 {
        self.dead_lettered_records.get()
    }

    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        match self.last_failure_timestamp_ms.get() {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            failure_events: self.failure_events(),
            failed_records: self.failed_records(),
            dead_lettered_records: self.dead_lettered_records(),
            last_failure: self.last_failure(),
        }
    }
}

type Labels = Vec<(String, String)>;

/// Metric families shared by every task, each task owns one labelled series per family.
struct StatisticsFamilies {
    failure_events: Family<Labels, Counter>,
    failed_records: Family<Labels, Counter>,
    dead_lettered_records: Family<Labels, Counter>,
    last_failure_timestamp_ms: Family<Labels, Gauge<i64, AtomicI64>>,
}

/// The global register of all task statistics.
struct GlobalRegistry {
    registry: Registry,
    families: StatisticsFamilies,
    // registration happens once per task start, a blocking mutex is fine
    by_name: parking_lot::Mutex<HashMap<String, Arc<ConnectorStatistics>>>,
}

impl GlobalRegistry {
    fn new() -> Self {
        let families = StatisticsFamilies {
            failure_events: Family::default(),
            failed_records: Family::default(),
            dead_lettered_records: Family::default(),
            last_failure_timestamp_ms: Family::default(),
        };

        let mut registry = Registry::default();
        let sub_registry = registry.sub_registry_with_prefix(STATISTICS_NAMESPACE);
        sub_registry.register(
            FAILURE_EVENTS_TOTAL,
            "A Counter to keep track of the total number of batches the sink engine failed to write",
            families.failure_events.clone(),
        );
        sub_registry.register(
            FAILED_RECORDS_TOTAL,
            "A Counter to keep track of the total number of records in failed batches",
            families.failed_records.clone(),
        );
        sub_registry.register(
            DEAD_LETTERED_RECORDS_TOTAL,
            "A Counter to keep track of the total number of records sent to the dead-letter reporter",
            families.dead_lettered_records.clone(),
        );
        sub_registry.register(
            LAST_FAILURE_TIMESTAMP,
            "A Gauge with the time of the last failed batch, in milliseconds since the epoch",
            families.last_failure_timestamp_ms.clone(),
        );

        GlobalRegistry {
            registry,
            families,
            by_name: parking_lot::Mutex::new(HashMap::new()),
        }
    }
}

/// GLOBAL_REGISTRY is the static global registry which is initialized only once.
static GLOBAL_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

fn global_registry() -> &'static GlobalRegistry {
    GLOBAL_REGISTRY.get_or_init(GlobalRegistry::new)
}

fn statistics_labels(name: &str) -> Labels {
    vec![
        (INSTANCE_LABEL.to_string(), name.to_string()),
        (VERSION_LABEL.to_string(), crate::version().to_string()),
    ]
}

/// Create the statistics of a task and register them under `name` so monitors can find them.
pub(crate) fn register_statistics(name: &str) -> Arc<ConnectorStatistics> {
    let global = global_registry();
    let labels = statistics_labels(name);
    let families = &global.families;

    let statistics = Arc::new(ConnectorStatistics {
        failure_events: families.failure_events.get_or_create(&labels).clone(),
        failed_records: families.failed_records.get_or_create(&labels).clone(),
        dead_lettered_records: families.dead_lettered_records.get_or_create(&labels).clone(),
        last_failure_timestamp_ms: families
            .last_failure_timestamp_ms
            .get_or_create(&labels)
            .clone(),
    });

    global
        .by_name
        .lock()
        .insert(name.to_string(), Arc::clone(&statistics));
    statistics
}

/// Remove the statistics registered under `name` and their labelled series. Handles already given
/// out keep their final values.
pub(crate) fn unregister_statistics(name: &str) {
    let global = global_registry();
    if global.by_name.lock().remove(name).is_none() {
        return;
    }

    let labels = statistics_labels(name);
    let families = &global.families;
    families.failure_events.remove(&labels);
    families.failed_records.remove(&labels);
    families.dead_lettered_records.remove(&labels);
    families.last_failure_timestamp_ms.remove(&labels);
}

/// Returns the statistics registered under `name`, if any.
pub fn lookup_statistics(name: &str) -> Option<Arc<ConnectorStatistics>> {
    global_registry().by_name.lock().get(name).cloned()
}

/// Encode every registered statistic in the prometheus text format.
pub fn encode_statistics() -> Result<String> {
    let mut buffer = String::new();
    encode(&mut buffer, &global_registry().registry)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_failure() {
        let statistics = ConnectorStatistics::new();
        assert_eq!(statistics.snapshot(), StatisticsSnapshot::default());

        statistics.record_failure(3, 0);
        statistics.record_failure(2, 1);

        let snapshot = statistics.snapshot();
        assert_eq!(snapshot.failure_events, 2);
        assert_eq!(snapshot.failed_records, 5);
        assert_eq!(snapshot.dead_lettered_records, 1);
        assert!(snapshot.last_failure.is_some());
    }

    #[test]
    fn test_statistics_name() {
        assert_eq!(statistics_name(7), "connect_sink.ConnectorStatistics7");
    }

    #[test]
    fn test_register_and_lookup() {
        let name = statistics_name(u32::MAX - 1);
        let statistics = register_statistics(&name);

        statistics.record_failure(4, 4);

        let found = lookup_statistics(&name).unwrap();
        assert_eq!(found.failure_events(), 1);
        assert_eq!(found.dead_lettered_records(), 4);
        assert!(lookup_statistics("connect_sink.ConnectorStatisticsMissing").is_none());
    }

    #[test]
    fn test_metric_names() {
        let name = statistics_name(u32::MAX);
        let statistics = register_statistics(&name);
        statistics.record_failure(3, 3);

        let encoded = encode_statistics().unwrap();
        let instance = format!(r#"instance="{name}""#);
        let version = format!(r#"version="{}""#, crate::version());
        let expected = [
            ("connect_sink_failure_events_total{", " 1"),
            ("connect_sink_failed_records_total{", " 3"),
            ("connect_sink_dead_lettered_records_total{", " 3"),
        ];

        let lines = encoded
            .trim()
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter(|line| line.contains(&instance))
            .collect::<Vec<&str>>();

        for (metric, value) in expected {
            assert!(
                lines
                    .iter()
                    .any(|l| l.starts_with(metric) && l.contains(&version) && l.ends_with(value)),
                "missing {metric} in {lines:?}"
            );
        }
        assert!(
            lines
                .iter()
                .any(|l| l.starts_with("connect_sink_last_failure_timestamp_ms{"))
        );
    }

    #[test]
    fn test_unregister_removes_series() {
        let name = statistics_name(u32::MAX - 2);
        let statistics = register_statistics(&name);
        statistics.record_failure(2, 0);

        unregister_statistics(&name);
        unregister_statistics(&name);

        assert!(lookup_statistics(&name).is_none());
        let instance = format!(r#"instance="{name}""#);
        assert!(!encode_statistics().unwrap().contains(&instance));
        assert_eq!(statistics.failed_records(), 2);
    }
}
