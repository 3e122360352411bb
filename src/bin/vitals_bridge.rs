// src/bin/vitals_bridge.rs
//! Runs the vitals simulator, overlays a live ESP32 device feed when one is
//! connected, and logs the merged vitals and insights as they change.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use vitalsync::analysis::{AnalysisRequest, AnalysisService, HttpAnalysisClient, UserProfile};
use vitalsync::config::DEMO_INTERVAL_MS;
use vitalsync::feed::{LiveDeviceFeed, LoopbackFeed};
use vitalsync::{LiveFeedMerger, SimulatorConfig, VitalsSimulator};

#[derive(Parser, Debug)]
#[command(name = "vitals_bridge", about = "Simulated vitals with live device overlay")]
struct Args {
    /// JSON simulator config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick every 10 seconds instead of hourly
    #[arg(long)]
    demo: bool,

    /// Override the tick interval
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Unix socket the device bridge writes JSON lines to
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Analysis endpoint to send each merged value to
    #[arg(long)]
    analysis_url: Option<String>,
}

#[cfg(unix)]
fn device_feed(socket: Option<PathBuf>) -> Arc<dyn LiveDeviceFeed> {
    match socket {
        Some(path) => Arc::new(vitalsync::feed::SocketFeed::new(path)),
        None => Arc::new(LoopbackFeed::new()),
    }
}

#[cfg(not(unix))]
fn device_feed(socket: Option<PathBuf>) -> Arc<dyn LiveDeviceFeed> {
    if socket.is_some() {
        log::warn!("Socket device feed is only available on unix; running without it");
    }
    Arc::new(LoopbackFeed::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulatorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimulatorConfig::default(),
    };
    if args.demo {
        config.interval_ms = DEMO_INTERVAL_MS;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = interval_ms;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;

    let analysis: Option<Arc<dyn AnalysisService>> = match &args.analysis_url {
        Some(url) => {
            let client: Arc<dyn AnalysisService> = Arc::new(HttpAnalysisClient::new(url.clone())?);
            Some(client)
        }
        None => None,
    };

    let simulator = VitalsSimulator::new(config);
    let merger = Arc::new(LiveFeedMerger::new());
    let feed = device_feed(args.socket.clone());
    let links = merger.attach(&simulator, &feed);

    let mut updates = merger.updates();
    feed.start().context("starting device feed")?;
    simulator.start();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(merged) => {
                    log::info!(
                        "[{}] {} bpm, {}/{} mmHg, SpO2 {}%, {:.1}°F (live: {})",
                        merged.timestamp.format("%H:%M:%S"),
                        merged.heart_rate,
                        merged.blood_pressure_systolic,
                        merged.blood_pressure_diastolic,
                        merged.oxygen_saturation,
                        merged.body_temperature,
                        merger.is_live_connected(),
                    );

                    let insights = simulator.get_health_insights();
                    log::info!("Health score {}", insights.health_score);
                    for alert in &insights.alerts {
                        log::warn!("Alert: {}", alert);
                    }

                    if let Some(service) = &analysis {
                        let service = Arc::clone(service);
                        let request = AnalysisRequest {
                            vitals: merged,
                            profile: UserProfile::default(),
                        };
                        tokio::spawn(async move {
                            match service.analyze(&request).await {
                                Ok(result) => log::info!(
                                    "Analysis ({:?}): {}",
                                    result.risk_level,
                                    result.analysis
                                ),
                                Err(e) => log::warn!("Analysis request failed: {}", e),
                            }
                        });
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Display fell behind; skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    links.detach(&simulator);
    feed.stop();
    simulator.shutdown();
    Ok(())
}
