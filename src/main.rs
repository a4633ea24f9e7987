use anyhow::{Context, Result};
use junction::connection::WebSocketTransport;
use junction::{load_config, Bridge, BridgeEvent, JunctionConfig};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const TICK_INTERVAL: Duration = Duration::from_millis(16);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "junction=info".into()),
        )
        .init();

    info!("Junction starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let config = load_config(&path)?;
            info!(path = %path, "Loaded configuration");
            config
        }
        None => {
            info!("No config file given, using defaults");
            JunctionConfig::default()
        }
    };

    let transport = WebSocketTransport::new()?;
    let mut bridge =
        Bridge::from_config(&config, transport).context("Invalid mapping configuration")?;

    info!(url = %config.connection.url, "Bridge ready");

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let mut last = Instant::now();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;

                for event in bridge.tick(dt) {
                    log_event(&event);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    let stats = bridge.connection_stats();
    info!(
        messages = stats.messages_received,
        snapshots = stats.snapshots,
        parse_faults = stats.parse_faults,
        protocol_faults = stats.protocol_faults,
        "Junction stopped"
    );

    Ok(())
}

fn log_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::Connected => info!("Producer connected"),
        BridgeEvent::Disconnected => warn!("Producer disconnected, retrying"),
        BridgeEvent::GaveUp { attempts } => {
            warn!(attempts = *attempts, "Producer unreachable, no further retries")
        }
        BridgeEvent::RunRestarted(restart) => {
            info!(run = restart.run, seed = restart.seed, "New simulation run")
        }
        BridgeEvent::RunCompleted(summary) => info!(
            total_arrived = summary.total_arrived,
            avg_wait = summary.avg_wait,
            total_reward = summary.total_reward,
            "Simulation run finished"
        ),
        BridgeEvent::Frame(frame) => {
            let phase = frame
                .signal
                .as_ref()
                .map(|s| s.phase_name.as_str())
                .unwrap_or("");
            debug!(
                entities = frame.entities.len(),
                sim_time = frame.sim_time,
                phase = phase,
                "Frame"
            );
        }
    }
}
