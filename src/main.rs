#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

use aislogger::config::Config;
use aislogger::diagnostics::{ErrorForwardLayer, ErrorSink};
use aislogger::notification::Notification;
use aislogger::Logger;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const NOTIFICATION_POLL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "aislogger.toml")]
    config: PathBuf,

    /// Raw capture file to replay under the `File` source
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Seconds to wait for tasks to finish on shutdown
    #[arg(long, default_value_t = 30)]
    shutdown_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let sink = ErrorSink::new();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorForwardLayer::new(sink.clone()))
        .init();

    let args = Args::parse();

    info!("Starting aislogger with config: {}", args.config.display());

    let config = if args.config.exists() {
        Config::load(&args.config)
            .await
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        warn!("Config file {} not found, using defaults", args.config.display());
        Config::default()
    };

    info!(
        "Loaded configuration with {} serial and {} network sources",
        config.serial.len(),
        config.network.clients.len()
    );

    let logger = Logger::start(config).await.context("starting logger")?;
    sink.attach(logger.registry_queue());

    let replay = async {
        if let Some(path) = &args.replay {
            match logger.replay_file(path).await {
                Ok(lines) => info!("Replayed {} lines from {}", lines, path.display()),
                Err(e) => error!("Replay of {} failed: {:#}", path.display(), e),
            }
        }
        std::future::pending::<()>().await
    };

    let headless = async {
        let mut tick = tokio::time::interval(NOTIFICATION_POLL);
        loop {
            tick.tick().await;
            for event in logger.drain_notifications() {
                log_notification(&event);
            }
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("Could not listen for Ctrl+C: {}", e);
            }
            info!("Ctrl+C received. Initiating graceful shutdown...");
        }
        _ = replay => {}
        _ = headless => {}
    }

    sink.detach();
    logger.stop(Duration::from_secs(args.shutdown_timeout_secs)).await;
    info!("Shutdown complete.");

    Ok(())
}

fn log_notification(event: &Notification) {
    match event {
        Notification::Insert { view } => info!(
            "New vessel {} {}",
            view.vessel.mmsi,
            view.vessel.name.as_deref().unwrap_or("")
        ),
        Notification::Old { mmsi, distance_km } => match distance_km {
            Some(km) => info!("Vessel {} went quiet at {:.1} km", mmsi, km),
            None => info!("Vessel {} went quiet", mmsi),
        },
        Notification::Remove { mmsi } => info!("Vessel {} removed", mmsi),
        Notification::Update { view } | Notification::Query { view } => debug!(
            "{} {} pos={:?}",
            event.tag(),
            view.vessel.mmsi,
            view.vessel.position()
        ),
        Notification::OwnPosition {
            latitude,
            longitude,
            sog,
            cog,
            source,
            ..
        } => info!(
            "Own position {:.5},{:.5} sog={:?} cog={:?} from {}",
            latitude, longitude, sog, cog, source
        ),
        Notification::RemarkDict { remarks } => debug!("{} remarks", remarks.len()),
        Notification::IdDb { identities } => debug!("{} identity records", identities.len()),
        Notification::Error { .. } => {}
    }
}
