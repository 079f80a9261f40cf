use super::SinkEngine;
use crate::message::SinkRecord;

/// Blackhole is an engine to emulate /dev/null
#[derive(Debug, Default)]
pub struct BlackholeEngine;

impl SinkEngine for BlackholeEngine {
    async fn put(&mut self, _records: &[SinkRecord]) -> crate::Result<()> {
        Ok(())
    }

    async fn stop(&mut self) {}
}
