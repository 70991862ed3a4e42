//! High-level API for starting and managing the AIS logger.
//!
//! [`Logger`] wires the whole pipeline together: source adapters feed the
//! hub's inbound queue, the hub feeds the registry and the relay sinks, and
//! the registry feeds the notification queue the caller drains.
//!
//! # Example
//!
//! ```no_run
//! use aislogger::Logger;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), aislogger::error::LoggerError> {
//! let logger = Logger::from_str(r#"
//! [general]
//! show_after_updates = 1
//!
//! [network]
//! clients = ["127.0.0.1:4001"]
//! "#).await?;
//!
//! logger.submit_line("File", "!AIVDM,1,1,,A,15RTgt0PAso;90TKcjM8h6g208CQ,0*4A");
//! for event in logger.drain_notifications() {
//!     println!("{}", event.tag());
//! }
//! logger.stop(Duration::from_secs(5)).await;
//! # Ok(())
//! # }
//! ```

use crate::alert::{load_remark_file, RemarkDict};
use crate::config::Config;
use crate::decode::AisDecoder;
use crate::diagnostics::ErrorSink;
use crate::endpoint_core::{EndpointCore, ExponentialBackoff};
use crate::error::Result;
use crate::hub::{Hub, HubSinks, PositionSource};
use crate::lookup::Lookups;
use crate::notification::{Notification, NotificationQueue};
use crate::registry::{Registry, RegistryCommand, RegistryQueue, RegistrySchedule, RegistrySettings, RegistryTask};
use crate::router::{create_queue, RawQueue, RawRecord, RelayQueue, SourceId};
use crate::routing::RoutingTable;
use crate::stats::{SourceStats, StatsHistory, StatsTable};
use crate::storage::{IdDbStore, LogStore};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A handle to a running logger pipeline.
///
/// Call [`Logger::stop`] to shut it down; dropping the handle leaves the
/// tasks running until the runtime exits.
pub struct Logger {
    cancel_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    inbound: RawQueue,
    registry_queue: RegistryQueue,
    notifications: NotificationQueue,
    raw_archive: RawQueue,
    stats: Arc<StatsTable>,
    routing_table: Arc<RoutingTable>,
}

impl Logger {
    /// Starts the pipeline and every configured adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. Adapters that fail
    /// later are restarted by their supervisor and never fail `start`.
    pub async fn start(config: Config) -> Result<Self> {
        config.validate()?;
        let general = &config.general;

        let cancel_token = CancellationToken::new();
        let mut handles = Vec::new();

        let inbound: RawQueue = create_queue(general.hub_queue_capacity);
        let registry_queue: RegistryQueue = create_queue(general.registry_queue_capacity);
        let notifications: NotificationQueue = create_queue(general.notification_queue_capacity);
        let raw_archive: RawQueue = create_queue(general.raw_queue_capacity);
        let serial_relay: Option<RelayQueue> = config
            .serial_server
            .as_ref()
            .map(|_| create_queue(general.relay_queue_capacity));
        let network_relay: Option<RelayQueue> = config
            .network
            .server_address
            .as_ref()
            .map(|_| create_queue(general.relay_queue_capacity));

        let routing_table = Arc::new(RoutingTable::from_config(&config));
        let stats = Arc::new(StatsTable::new());
        let lookups = Arc::new(Lookups::load(general.mid_file.as_deref(), general.typecode_file.as_deref()).await);

        // Registry
        let mut registry = Registry::new(
            RegistrySettings::from_config(&config),
            lookups,
            notifications.clone(),
        );
        let iddb = config
            .iddb
            .enabled
            .then(|| config.iddb.path.clone())
            .flatten()
            .map(IdDbStore::new);
        if let Some(store) = &iddb {
            match store.load().await {
                Ok(records) => {
                    info!("Loaded {} identity records from {}", records.len(), store.path().display());
                    registry.seed_identities(records);
                }
                Err(e) => warn!("Could not load identity database: {}", e),
            }
        }
        if let Some(path) = &config.alert.remark_file {
            match load_remark_file(path).await {
                Ok(remarks) => registry.set_remarks(remarks),
                Err(e) => warn!("Could not load remark file: {}", e),
            }
        }
        let registry_task = RegistryTask {
            registry,
            inbound: registry_queue.clone(),
            schedule: RegistrySchedule::from_config(&config),
            log_store: config
                .logging
                .enabled
                .then(|| config.logging.dir.clone())
                .flatten()
                .map(LogStore::new),
            iddb,
            remark_file: config.alert.remark_file.clone(),
        };
        let token = cancel_token.child_token();
        handles.push(tokio::spawn(async move {
            if let Err(e) = registry_task.run(token).await {
                error!("Registry failed: {:#}", e);
            }
        }));

        // Hub
        let hub = Hub::new(
            Arc::new(AisDecoder),
            routing_table.clone(),
            stats.clone(),
            PositionSource::parse(&config.position.use_position_from),
            HubSinks {
                registry: registry_queue.clone(),
                raw_archive: raw_archive.clone(),
                serial_relay: serial_relay.clone(),
                network_relay: network_relay.clone(),
            },
        );
        let hub_inbound = inbound.clone();
        let token = cancel_token.child_token();
        handles.push(tokio::spawn(async move {
            if let Err(e) = hub.run(hub_inbound, token).await {
                error!("Hub failed: {:#}", e);
            }
        }));

        // Stats reporter
        if general.stats_interval_secs > 0 {
            handles.push(tokio::spawn(report_stats(
                stats.clone(),
                Duration::from_secs(general.stats_interval_secs),
                cancel_token.child_token(),
            )));
        }

        // Serial readers
        for serial in &config.serial {
            let name = format!("Serial Reader {} ({})", serial.name, serial.device);
            let serial = serial.clone();
            let inbound = inbound.clone();
            let task_token = cancel_token.child_token();

            handles.push(tokio::spawn(supervise(name, task_token.clone(), move || {
                crate::endpoints::serial::run_reader(serial.clone(), inbound.clone(), task_token.clone())
            })));
        }

        // Serial relay server
        if let (Some(server), Some(queue)) = (&config.serial_server, &serial_relay) {
            let name = format!("Serial Relay Server ({})", server.device);
            let server = server.clone();
            let queue = queue.clone();
            let task_token = cancel_token.child_token();

            handles.push(tokio::spawn(supervise(name, task_token.clone(), move || {
                crate::endpoints::serial::run_relay_server(server.clone(), queue.clone(), task_token.clone())
            })));
        }

        // Network relay server
        if let (Some(address), Some(queue)) = (&config.network.server_address, &network_relay) {
            let name = format!("Network Relay Server ({})", address);
            let address = address.clone();
            let queue = queue.clone();
            let capacity = general.relay_queue_capacity;
            let task_token = cancel_token.child_token();

            handles.push(tokio::spawn(supervise(name, task_token.clone(), move || {
                crate::endpoints::tcp::run_relay_server(address.clone(), queue.clone(), capacity, task_token.clone())
            })));
        }

        // Network clients
        let connect_timeout = Duration::from_secs(config.network.connect_timeout_secs.max(1));
        for address in &config.network.clients {
            let name = format!("Network Client ({})", address);
            let address = address.clone();
            let inbound = inbound.clone();
            let task_token = cancel_token.child_token();

            handles.push(tokio::spawn(supervise(name, task_token.clone(), move || {
                crate::endpoints::tcp::run_client(address.clone(), connect_timeout, inbound.clone(), task_token.clone())
            })));
        }

        info!(
            "Logger started with {} serial source(s), {} network source(s) and {} task(s)",
            config.serial.len(),
            config.network.clients.len(),
            handles.len()
        );

        Ok(Self {
            cancel_token,
            handles,
            inbound,
            registry_queue,
            notifications,
            raw_archive,
            stats,
            routing_table,
        })
    }

    /// Starts a logger from a TOML configuration string.
    pub async fn from_str(toml: &str) -> Result<Self> {
        let config = Config::parse(toml)?;
        Self::start(config).await
    }

    /// Starts a logger by loading configuration from a file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path).await?;
        Self::start(config).await
    }

    /// Pushes one raw line into the hub as if read from `source`.
    ///
    /// Returns `false` if the line is not a sentence and was dropped.
    pub fn submit_line(&self, source: &str, line: &str) -> bool {
        EndpointCore::new(SourceId::new(source), self.inbound.clone())
            .handle_line(Bytes::copy_from_slice(line.as_bytes()))
    }

    /// Replays a capture file through the hub under the `File` source.
    pub async fn replay_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        crate::endpoints::replay::run(path, self.inbound.clone(), self.cancel_token.child_token()).await
    }

    /// Requests a `query` notification for `mmsi`.
    pub fn query(&self, mmsi: u32) {
        self.registry_queue.push(RegistryCommand::Query(mmsi));
    }

    pub fn query_remarks(&self) {
        self.registry_queue.push(RegistryCommand::QueryRemarks);
    }

    pub fn query_iddb(&self) {
        self.registry_queue.push(RegistryCommand::QueryIdDb);
    }

    /// Replaces the whole remark dictionary (and the remark file, if set).
    pub fn replace_remarks(&self, remarks: RemarkDict) {
        self.registry_queue.push(RegistryCommand::ReplaceRemarks(remarks));
    }

    /// Sets the own position by hand; decoded fixes are ignored afterwards.
    pub fn override_position(&self, latitude: f64, longitude: f64) {
        self.registry_queue
            .push(RegistryCommand::OverridePosition { latitude, longitude });
    }

    /// Takes every pending notification, oldest first.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.drain()
    }

    /// Waits for the next notification.
    pub async fn next_notification(&self) -> Notification {
        self.notifications.pop().await
    }

    /// Takes every archived raw record, oldest first.
    pub fn drain_raw(&self) -> Vec<RawRecord> {
        self.raw_archive.drain()
    }

    /// Per-source counters, sorted by source name.
    pub fn stats(&self) -> Vec<(String, SourceStats)> {
        self.stats.snapshot()
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// Sink forwarding into this logger's registry, for [`crate::diagnostics::ErrorForwardLayer`].
    pub fn error_sink(&self) -> ErrorSink {
        ErrorSink::attached(self.registry_queue.clone())
    }

    pub fn registry_queue(&self) -> RegistryQueue {
        self.registry_queue.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled()
    }

    /// Cancels every task and waits up to `timeout` for them to finish;
    /// whatever is still running afterwards is aborted.
    pub async fn stop(self, timeout: Duration) {
        info!("Logger stopping...");
        self.cancel_token.cancel();

        let aborts: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(self.handles))
            .await
            .is_err()
        {
            warn!("Shutdown timed out after {:?}, aborting remaining tasks", timeout);
            for handle in aborts {
                handle.abort();
            }
        }
        info!("Logger stopped");
    }
}

async fn report_stats(stats: Arc<StatsTable>, every: Duration, token: CancellationToken) {
    let mut history = StatsHistory::new(3600);
    let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + every, every);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Stats Reporter shutting down.");
                break;
            }
            _ = tick.tick() => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                history.push(stats.totals(now));

                for (source, s) in stats.snapshot() {
                    info!("Source {}: received={} parsed={}", source, s.received, s.parsed);
                }
                if let Some(window) = history.aggregate(every.as_secs()) {
                    info!(
                        "Stats [{}s] {:.1} lines/s, {:.0}% parsed",
                        every.as_secs(),
                        window.received_per_sec,
                        window.parse_ratio * 100.0
                    );
                }
                if let Some(hour) = history.aggregate(3600) {
                    info!(
                        "Stats [1hr] received={} parsed={} samples={}",
                        hour.received, hour.parsed, hour.sample_count
                    );
                }
            }
        }
    }
}

/// Restarts an adapter whenever it returns, until cancelled.
async fn supervise<F, Fut>(name: String, cancel_token: CancellationToken, task_factory: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), 2.0);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("{} stopped", name);
                break;
            }
            _ = async {
                let start_time = std::time::Instant::now();
                let result = task_factory().await;

                if start_time.elapsed() > Duration::from_secs(60) {
                    backoff.reset();
                }

                match result {
                    Ok(_) if cancel_token.is_cancelled() => {}
                    Ok(_) => {
                        warn!("{} returned without being cancelled, restarting", name);
                    }
                    Err(e) => {
                        error!("{} failed: {:#}", name, e);
                    }
                }
            } => {}
        }

        let wait = backoff.next_backoff();
        debug!("Restarting {} in {:?}", name, wait);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {},
            _ = cancel_token.cancelled() => {
                info!("{} stopped while waiting to restart", name);
                break;
            }
        }
    }
}
