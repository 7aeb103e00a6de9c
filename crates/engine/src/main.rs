//! triarb - triangular arbitrage decision engine
//!
//! Runs the control loop against the paper venue, with order books served
//! from a JSON fixture.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use triarb_core::{EngineEvent, EventBus};
use triarb_engine::{logging, settings, Engine, EngineHandle};
use triarb_market_data::{MarketDataProvider, StaticMarketData};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    info!("Starting triarb v{}", env!("CARGO_PKG_VERSION"));

    let config = settings::load()?;
    if !config.paper.enabled {
        anyhow::bail!("no live venue is configured; set paper.enabled = true");
    }

    let fixture = config
        .market_data
        .fixture_path
        .clone()
        .context("market_data.fixture_path is required")?;
    let provider: Arc<dyn MarketDataProvider> = Arc::new(StaticMarketData::from_json_file(&fixture)?);

    let events = EventBus::default();
    let (engine, handle) = Engine::paper(config, provider, events.clone())?;

    tokio::spawn(log_events(events));
    tokio::spawn(shutdown_on_signal(handle.clone()));

    engine.run().await;

    let stats = handle.stats();
    info!(
        cycles = stats.cycles,
        completed = stats.trades_completed,
        failed = stats.trades_failed,
        "Engine stopped"
    );
    Ok(())
}

/// Mirror engine events into the log as JSON
async fn log_events(events: EventBus) {
    let mut stream = BroadcastStream::new(events.subscribe());
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                match event {
                    EngineEvent::ExposureAlert { .. } | EngineEvent::EngineHalted { .. } => {
                        error!(event = event.name(), %payload, "Engine event")
                    }
                    EngineEvent::TradeFailed { .. } | EngineEvent::ExecutionBlocked { .. } => warn!(event = event.name(), %payload, "Engine event"),
                    _ => info!(event = event.name(), %payload, "Engine event"),
                }
            }
            Err(e) => warn!(error = %e, "Event logger lagged"),
        }
    }
}

async fn shutdown_on_signal(handle: EngineHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received termination signal"),
    }

    if handle.shutdown().await.is_err() {
        warn!("Engine already stopped");
    }
}
