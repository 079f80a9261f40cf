use std::error::Error;

use connect_sink_core::engine::BuiltinEngineBuilder;
use tokio::io::BufReader;
use tracing::{error, info};

mod cmdline;
mod properties;
mod runner;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();
    let settings = cmdline::Settings::from_matches(&matches)?;
    info!(
        version = connect_sink_core::version(),
        batch_size = settings.batch_size,
        "Starting connect-sink"
    );

    let input = BufReader::new(tokio::io::stdin());
    let summary = runner::run(BuiltinEngineBuilder, &settings, input).await?;

    if let Some(statistics) = summary.statistics {
        print!("{statistics}");
    }
    Ok(())
}
