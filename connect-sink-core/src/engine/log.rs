use super::SinkEngine;
use crate::message::SinkRecord;

#[derive(Debug, Default)]
pub struct LogEngine;

impl LogEngine {
    fn log_line(record: &SinkRecord) -> String {
        let mut headers = String::new();
        record.headers.iter().for_each(|(k, v)| {
            headers.push_str(&format!("{k}: {v}, "));
        });

        format!(
            "Payload - {} Key - {} Timestamp - {} Headers - {} Position - {}",
            &String::from_utf8_lossy(&record.value),
            record
                .key
                .as_ref()
                .map(|k| String::from_utf8_lossy(k).into_owned())
                .unwrap_or_default(),
            record
                .timestamp
                .map(|t| t.timestamp_millis())
                .unwrap_or_default(),
            headers,
            record,
        )
    }
}

impl SinkEngine for LogEngine {
    async fn put(&mut self, records: &[SinkRecord]) -> crate::Result<()> {
        for record in records {
            tracing::info!("{}", Self::log_line(record));
        }
        Ok(())
    }

    async fn stop(&mut self) {
        tracing::info!("Log engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use bytes::Bytes;
    use chrono::DateTime;

    use super::LogEngine;
    use crate::engine::SinkEngine;
    use crate::message::SinkRecord;

    #[test]
    fn test_log_line() {
        let record = SinkRecord {
            topic: "topic".into(),
            partition: 1,
            offset: 7,
            key: Some(Bytes::from_static(b"k1")),
            value: Bytes::from_static(b"Hello, World!"),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000),
            headers: Arc::new(HashMap::from([("h".to_string(), "v".to_string())])),
        };

        assert_eq!(
            LogEngine::log_line(&record),
            "Payload - Hello, World! Key - k1 Timestamp - 1700000000000 Headers - h: v,  Position - topic-1@7"
        );
    }

    #[tokio::test]
    async fn test_log_engine() {
        let mut engine = LogEngine;
        let records = vec![SinkRecord {
            topic: "topic".into(),
            value: Bytes::from_static(b"Hello, World!"),
            ..Default::default()
        }];

        assert!(engine.put(&records).await.is_ok());
        engine.stop().await;
    }
}
