use crate::error::{LoggerError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub iddb: IdDbConfig,
    #[serde(default)]
    pub serial: Vec<SerialConfig>,
    pub serial_server: Option<SerialServerConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_hub_queue_capacity")]
    pub hub_queue_capacity: usize,
    #[serde(default = "default_registry_queue_capacity")]
    pub registry_queue_capacity: usize,
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,
    #[serde(default = "default_raw_queue_capacity")]
    pub raw_queue_capacity: usize,
    #[serde(default = "default_relay_queue_capacity")]
    pub relay_queue_capacity: usize,
    /// Seconds without updates before a vessel is marked as aging.
    #[serde(default = "default_grey_after_secs")]
    pub grey_after_secs: u64,
    /// Seconds without updates before a vessel is removed.
    #[serde(default = "default_delete_after_secs")]
    pub delete_after_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Number of updates before a vessel becomes visible.
    #[serde(default = "default_show_after_updates")]
    pub show_after_updates: u64,
    #[serde(default = "default_true")]
    pub show_base_stations: bool,
    #[serde(default = "default_true")]
    pub show_class_b_stations: bool,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    pub mid_file: Option<PathBuf>,
    pub typecode_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            hub_queue_capacity: default_hub_queue_capacity(),
            registry_queue_capacity: default_registry_queue_capacity(),
            notification_queue_capacity: default_notification_queue_capacity(),
            raw_queue_capacity: default_raw_queue_capacity(),
            relay_queue_capacity: default_relay_queue_capacity(),
            grey_after_secs: default_grey_after_secs(),
            delete_after_secs: default_delete_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            show_after_updates: default_show_after_updates(),
            show_base_stations: true,
            show_class_b_stations: true,
            stats_interval_secs: default_stats_interval_secs(),
            mid_file: None,
            typecode_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionConfig {
    /// Use the fixed position below and ignore decoded fixes.
    #[serde(default, rename = "override")]
    pub override_on: bool,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Source name to accept own-position fixes from, or `any`.
    #[serde(default = "default_position_source")]
    pub use_position_from: String,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            override_on: false,
            latitude: 0.0,
            longitude: 0.0,
            use_position_from: default_position_source(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertConfig {
    pub remark_file: Option<PathBuf>,
    /// Alerts only apply within this distance when set.
    pub max_distance_km: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_interval_secs")]
    pub interval_secs: u64,
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub log_base_stations: bool,
    /// MMSI written for own-ship position rows.
    #[serde(default = "default_own_mmsi")]
    pub own_mmsi: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_log_interval_secs(),
            dir: None,
            log_base_stations: false,
            own_mmsi: default_own_mmsi(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdDbConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_interval_secs")]
    pub interval_secs: u64,
    pub path: Option<PathBuf>,
}

impl Default for IdDbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_log_interval_secs(),
            path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(value: FlowControl) -> Self {
        match value {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Source name used for stats, routing and position arbitration.
    pub name: String,
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub flow_control: FlowControl,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default)]
    pub relay_to_serial: bool,
    #[serde(default)]
    pub relay_to_network: bool,
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SerialServerConfig {
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub flow_control: FlowControl,
    /// Only write while the carrier-detect line is raised.
    #[serde(default = "default_true")]
    pub require_carrier: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Bind address of the relay server; the server is off when unset.
    pub server_address: Option<String>,
    /// Peers (`host:port`) to read data from.
    #[serde(default)]
    pub clients: Vec<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub clients_to_serial: Vec<String>,
    #[serde(default)]
    pub clients_to_server: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: None,
            clients: Vec::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            clients_to_serial: Vec::new(),
            clients_to_server: Vec::new(),
        }
    }
}

fn default_hub_queue_capacity() -> usize { 10_000 }
fn default_registry_queue_capacity() -> usize { 1000 }
fn default_notification_queue_capacity() -> usize { 1000 }
fn default_raw_queue_capacity() -> usize { 500 }
fn default_relay_queue_capacity() -> usize { 500 }
fn default_grey_after_secs() -> u64 { 600 }
fn default_delete_after_secs() -> u64 { 3600 }
fn default_sweep_interval_secs() -> u64 { 10 }
fn default_show_after_updates() -> u64 { 3 }
fn default_stats_interval_secs() -> u64 { 60 }
fn default_log_interval_secs() -> u64 { 600 }
fn default_own_mmsi() -> u32 { 1 }
fn default_baud() -> u32 { 38_400 }
fn default_read_timeout_secs() -> u64 { 60 }
fn default_connect_timeout_secs() -> u64 { 30 }
fn default_position_source() -> String { "any".to_string() }
fn default_true() -> bool { true }

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| LoggerError::storage(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.general;
        for (name, cap) in [
            ("hub_queue_capacity", g.hub_queue_capacity),
            ("registry_queue_capacity", g.registry_queue_capacity),
            ("notification_queue_capacity", g.notification_queue_capacity),
            ("raw_queue_capacity", g.raw_queue_capacity),
            ("relay_queue_capacity", g.relay_queue_capacity),
        ] {
            if cap == 0 {
                return Err(LoggerError::config(format!("{} must be non-zero", name)));
            }
        }

        if g.delete_after_secs <= g.grey_after_secs {
            return Err(LoggerError::config(format!(
                "delete_after_secs ({}) must exceed grey_after_secs ({})",
                g.delete_after_secs, g.grey_after_secs
            )));
        }

        let mut names = HashSet::new();
        for source in self.serial.iter().map(|s| &s.name).chain(&self.network.clients) {
            if !names.insert(source.as_str()) {
                return Err(LoggerError::config(format!("Duplicate source name '{}'", source)));
            }
        }

        if let Some(server) = &self.serial_server {
            if self.serial.iter().any(|s| s.device == server.device) {
                return Err(LoggerError::config(format!(
                    "Serial device {} is used both as input and as relay server",
                    server.device
                )));
            }
        }

        for s in &self.serial {
            #[cfg(unix)]
            if !Path::new(&s.device).exists() {
                tracing::warn!("Serial device {} does not exist (source {})", s.device, s.name);
            }
        }

        if self.logging.enabled && self.logging.dir.is_none() {
            return Err(LoggerError::config("logging.enabled requires logging.dir"));
        }
        if self.iddb.enabled && self.iddb.path.is_none() {
            return Err(LoggerError::config("iddb.enabled requires iddb.path"));
        }

        if self.position.override_on
            && (!(-90.0..=90.0).contains(&self.position.latitude)
                || !(-180.0..=180.0).contains(&self.position.longitude))
        {
            return Err(LoggerError::config(format!(
                "Override position {},{} is out of range",
                self.position.latitude, self.position.longitude
            )));
        }

        Ok(())
    }
}
