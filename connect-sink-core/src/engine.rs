//! The sink engine performs the actual write of a batch to the destination store. The task only
//! consumes its contract: a batch is either written or the whole call fails.

use tracing::info;

use crate::Result;
use crate::config::SinkConfig;
use crate::error::Error;
use crate::message::SinkRecord;

/// A [Blackhole] engine which accepts every batch and writes nowhere, semantic equivalent of
/// `/dev/null`.
mod blackhole;
pub use blackhole::BlackholeEngine;

/// [Log] engine prints every record of the batch through `tracing`.
mod log;
pub use log::LogEngine;

pub const SINK_TYPE: &str = "sink.type";

/// Set of operations implemented by a sink engine.
#[trait_variant::make(SinkEngine: Send)]
pub trait LocalSinkEngine {
    /// Write the batch in the given order. Any error means the batch as a whole was not written.
    async fn put(&mut self, records: &[SinkRecord]) -> Result<()>;

    /// Release the engine's resources. Called at most once by the task.
    async fn stop(&mut self);
}

/// Creates the engine when the task starts. A failure here aborts the start.
pub trait SinkEngineBuilder: Send + Sync {
    type Engine: SinkEngine;

    fn build(&self, config: &SinkConfig) -> Result<Self::Engine>;
}

impl<F, E> SinkEngineBuilder for F
where
    F: Fn(&SinkConfig) -> Result<E> + Send + Sync,
    E: SinkEngine,
{
    type Engine = E;

    fn build(&self, config: &SinkConfig) -> Result<E> {
        self(config)
    }
}

/// Engines that ship with the connector, selected with `sink.type`.
#[derive(Debug)]
pub enum BuiltinEngine {
    Log(LogEngine),
    Blackhole(BlackholeEngine),
}

impl SinkEngine for BuiltinEngine {
    async fn put(&mut self, records: &[SinkRecord]) -> Result<()> {
        match self {
            BuiltinEngine::Log(engine) => SinkEngine::put(engine, records).await,
            BuiltinEngine::Blackhole(engine) => SinkEngine::put(engine, records).await,
        }
    }

    async fn stop(&mut self) {
        match self {
            BuiltinEngine::Log(engine) => SinkEngine::stop(engine).await,
            BuiltinEngine::Blackhole(engine) => SinkEngine::stop(engine).await,
        }
    }
}

/// Builds a [BuiltinEngine] from `sink.type` (`log` when unset).
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngineBuilder;

impl SinkEngineBuilder for BuiltinEngineBuilder {
    type Engine = BuiltinEngine;

    fn build(&self, config: &SinkConfig) -> Result<BuiltinEngine> {
        let sink_type = config.get(SINK_TYPE).unwrap_or("log");
        let engine = match sink_type.trim().to_lowercase().as_str() {
            "log" => BuiltinEngine::Log(LogEngine),
            "blackhole" => BuiltinEngine::Blackhole(BlackholeEngine),
            other => {
                return Err(Error::Config(format!(
                    "Unknown {SINK_TYPE} {other:?}, expected one of [log, blackhole]"
                )));
            }
        };
        info!(sink_type, "Sink engine created");
        Ok(engine)
    }
}
