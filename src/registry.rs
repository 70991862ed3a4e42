//! Vessel registry and lifecycle manager.
//!
//! [`Registry`] holds all vessel, identity and remark state and is only ever
//! touched by the task running [`RegistryTask::run`]. Everything else talks
//! to it through [`RegistryCommand`]s on its inbound queue and listens on
//! the notification queue. All state transitions take `now` explicitly so
//! the lifecycle can be driven deterministically in tests.

use crate::alert::{self, AlertMode, RemarkDict};
use crate::config::Config;
use crate::decode::VesselReport;
use crate::error::Result;
use crate::geo::{distance_bearing, georef, round1};
use crate::lookup::Lookups;
use crate::notification::{Notification, NotificationQueue};
use crate::queue::DropOldestQueue;
use crate::storage::{IdDbStore, LogStore, MetadataRow, PositionRow};
use crate::vessel::{AgeState, IdentityRecord, TransponderClass, VesselRecord, VesselView};
use ahash::{AHashMap, AHashSet, RandomState};
use chrono::{DateTime, Utc};
use std::hash::BuildHasher;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Source name used for positions set by hand.
pub const MANUAL_SOURCE: &str = "Manual";

/// Commands accepted by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCommand {
    Vessel(VesselReport),
    /// Decoded own-position fix that passed source arbitration.
    OwnPosition {
        latitude: f64,
        longitude: f64,
        sog: Option<f64>,
        cog: Option<f64>,
        source: String,
    },
    /// Manual position; decoded fixes are ignored from then on.
    OverridePosition { latitude: f64, longitude: f64 },
    Query(u32),
    QueryRemarks,
    QueryIdDb,
    /// Replaces the whole remark dictionary.
    ReplaceRemarks(RemarkDict),
    /// Diagnostic passed through as an `error` notification.
    Error(String),
}

pub type RegistryQueue = Arc<DropOldestQueue<RegistryCommand>>;

#[derive(Debug, Clone, PartialEq)]
pub struct OwnPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

impl OwnPosition {
    fn manual(latitude: f64, longitude: f64, now: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            sog: None,
            cog: None,
            source: MANUAL_SOURCE.to_string(),
            updated_at: now,
        }
    }

    fn notification(&self) -> Notification {
        Notification::OwnPosition {
            latitude: self.latitude,
            longitude: self.longitude,
            sog: self.sog,
            cog: self.cog,
            georef: georef(self.latitude, self.longitude),
            source: self.source.clone(),
            time: self.updated_at,
        }
    }
}

/// Registry behavior derived from configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub show_after_updates: u64,
    pub show_base_stations: bool,
    pub show_class_b_stations: bool,
    pub grey_after_secs: i64,
    pub delete_after_secs: i64,
    pub max_distance_km: Option<f64>,
    /// Manual own position from configuration.
    pub position_override: Option<(f64, f64)>,
    pub own_mmsi: u32,
    pub log_base_stations: bool,
}

impl RegistrySettings {
    pub fn from_config(config: &Config) -> Self {
        let g = &config.general;
        Self {
            show_after_updates: g.show_after_updates,
            show_base_stations: g.show_base_stations,
            show_class_b_stations: g.show_class_b_stations,
            grey_after_secs: clamp_secs(g.grey_after_secs),
            delete_after_secs: clamp_secs(g.delete_after_secs),
            max_distance_km: config.alert.max_distance_km,
            position_override: config
                .position
                .override_on
                .then_some((config.position.latitude, config.position.longitude)),
            own_mmsi: config.logging.own_mmsi,
            log_base_stations: config.logging.log_base_stations,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn clamp_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// In-memory vessel state.
pub struct Registry {
    settings: RegistrySettings,
    lookups: Arc<Lookups>,
    notifications: NotificationQueue,
    vessels: AHashMap<u32, VesselRecord>,
    identities: AHashMap<u32, IdentityRecord>,
    dirty_identities: AHashSet<u32>,
    remarks: RemarkDict,
    own_position: Option<OwnPosition>,
    override_active: bool,
    metadata_hashes: AHashMap<u32, u64>,
    hasher: RandomState,
}

impl Registry {
    pub fn new(settings: RegistrySettings, lookups: Arc<Lookups>, notifications: NotificationQueue) -> Self {
        let mut registry = Self {
            settings,
            lookups,
            notifications,
            vessels: AHashMap::new(),
            identities: AHashMap::new(),
            dirty_identities: AHashSet::new(),
            remarks: RemarkDict::new(),
            own_position: None,
            override_active: false,
            metadata_hashes: AHashMap::new(),
            hasher: RandomState::new(),
        };
        if let Some((latitude, longitude)) = registry.settings.position_override {
            registry.override_active = true;
            registry.own_position = Some(OwnPosition::manual(latitude, longitude, Utc::now()));
        }
        registry
    }

    /// Seeds the identity store, e.g. from the identity database.
    pub fn seed_identities(&mut self, records: Vec<IdentityRecord>) {
        for record in records {
            self.identities.insert(record.mmsi, record);
        }
    }

    pub fn set_remarks(&mut self, remarks: RemarkDict) {
        self.remarks = remarks;
    }

    /// Emits the known own position, if any.
    pub fn announce_own_position(&self) {
        if let Some(own) = &self.own_position {
            self.emit(own.notification());
        }
    }

    pub fn handle(&mut self, command: RegistryCommand, now: DateTime<Utc>) {
        match command {
            RegistryCommand::Vessel(report) => self.apply_vessel(&report, now),
            RegistryCommand::OwnPosition {
                latitude,
                longitude,
                sog,
                cog,
                source,
            } => {
                if self.override_active {
                    trace!("Own position from {} ignored, override active", source);
                    return;
                }
                self.set_own_position(OwnPosition {
                    latitude,
                    longitude,
                    sog,
                    cog,
                    source,
                    updated_at: now,
                });
            }
            RegistryCommand::OverridePosition { latitude, longitude } => {
                self.override_active = true;
                self.set_own_position(OwnPosition::manual(latitude, longitude, now));
            }
            RegistryCommand::Query(mmsi) => self.query(mmsi),
            RegistryCommand::QueryRemarks => self.emit(Notification::RemarkDict {
                remarks: self.remarks.clone(),
            }),
            RegistryCommand::QueryIdDb => {
                let mut identities: Vec<_> = self.identities.values().cloned().collect();
                identities.sort_by_key(|r| r.mmsi);
                self.emit(Notification::IdDb { identities });
            }
            RegistryCommand::ReplaceRemarks(remarks) => {
                debug!("Remark dictionary replaced ({} entries)", remarks.len());
                self.remarks = remarks;
            }
            RegistryCommand::Error(message) => self.emit(Notification::Error { message }),
        }
    }

    fn threshold(&self) -> u64 {
        self.settings.show_after_updates.max(1)
    }

    fn is_visible(&self, vessel: &VesselRecord) -> bool {
        let class_shown = match vessel.class {
            TransponderClass::A => true,
            TransponderClass::B => self.settings.show_class_b_stations,
            TransponderClass::Base => self.settings.show_base_stations,
        };
        class_shown && vessel.version_count >= self.threshold()
    }

    fn emit(&self, notification: Notification) {
        if self.notifications.push(notification) {
            trace!("Notification queue full, oldest event dropped");
        }
    }

    fn view(&self, vessel: &VesselRecord, sound_alert: bool) -> VesselView {
        let identity = if vessel.imo.is_none() || vessel.name.is_none() || vessel.callsign.is_none() {
            self.identities.get(&vessel.mmsi).cloned()
        } else {
            None
        };
        let remark = self
            .remarks
            .get(&vessel.mmsi)
            .map(|r| r.remark.clone())
            .filter(|r| !r.is_empty());
        VesselView {
            vessel: vessel.clone(),
            identity,
            remark,
            sound_alert,
        }
    }

    fn set_own_position(&mut self, own: OwnPosition) {
        self.emit(own.notification());
        self.own_position = Some(own);
    }

    /// Applies one decoded vessel report.
    pub fn apply_vessel(&mut self, report: &VesselReport, now: DateTime<Utc>) {
        let Some(class) = TransponderClass::from_message_type(report.message_type) else {
            trace!("Ignoring message type {} from {}", report.message_type, report.mmsi);
            return;
        };
        if report.mmsi <= 1 {
            return;
        }
        let mmsi = report.mmsi;
        let threshold = self.threshold();

        if report.decoded && report.fields.imo.is_some() {
            let f = &report.fields;
            self.identities
                .entry(mmsi)
                .or_insert_with(|| IdentityRecord {
                    mmsi,
                    ..Default::default()
                })
                .merge(f.imo, f.name.as_deref(), f.callsign.as_deref());
            self.dirty_identities.insert(mmsi);
        }

        let lookups = &self.lookups;
        let vessel = self.vessels.entry(mmsi).or_insert_with(|| {
            let mut v = VesselRecord::new(mmsi, class, report.message_type, now);
            v.nation = lookups.nation(mmsi).map(str::to_string);
            v
        });

        if report.decoded {
            vessel.merge(&report.fields);
        }
        vessel.class = class;
        vessel.last_message_type = report.message_type;
        vessel.updated_at = now;
        vessel.version_count += 1;
        vessel.age = AgeState::Fresh;

        if let Some(code) = vessel.ship_type {
            vessel.type_name = lookups.type_name(code).map(str::to_string);
        }
        if let Some((lat, lon)) = vessel.position() {
            vessel.georef = georef(lat, lon);
            if let Some(own) = &self.own_position {
                let db = distance_bearing((own.latitude, own.longitude), (lat, lon));
                vessel.distance_km = Some(round1(db.km));
                vessel.bearing_deg = Some(round1(db.bearing_deg));
            }
        }

        let class_shown = match class {
            TransponderClass::A => true,
            TransponderClass::B => self.settings.show_class_b_stations,
            TransponderClass::Base => self.settings.show_base_stations,
        };
        let visible = class_shown && vessel.version_count >= threshold;

        let mode = self.remarks.get(&mmsi).map_or(AlertMode::None, |r| r.mode);
        let outcome = alert::evaluate(
            mode,
            vessel.distance_km,
            self.settings.max_distance_km,
            &mut vessel.sound_alerted,
            visible,
        );
        vessel.alert = outcome.alert;
        let version = vessel.version_count;

        if !visible {
            return;
        }
        if let Some(vessel) = self.vessels.get(&mmsi) {
            let view = Box::new(self.view(vessel, outcome.sound));
            self.emit(if version == threshold {
                Notification::Insert { view }
            } else {
                Notification::Update { view }
            });
        }
    }

    fn query(&mut self, mmsi: u32) {
        let max_distance_km = self.settings.max_distance_km;
        let mode = self.remarks.get(&mmsi).map_or(AlertMode::None, |r| r.mode);
        let Some(vessel) = self.vessels.get_mut(&mmsi) else {
            debug!("Query for unknown MMSI {}", mmsi);
            return;
        };
        let outcome = alert::evaluate(mode, vessel.distance_km, max_distance_km, &mut vessel.sound_alerted, false);
        vessel.alert = outcome.alert;

        if let Some(vessel) = self.vessels.get(&mmsi) {
            if self.is_visible(vessel) {
                let view = Box::new(self.view(vessel, false));
                self.emit(Notification::Query { view });
            }
        }
    }

    /// Marks idle vessels as aging and removes expired ones.
    ///
    /// `old` and `remove` are only emitted for vessels that were visible.
    /// A vessel still below the update threshold was never announced with
    /// `insert`, so it ages and expires silently.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let grey = self.settings.grey_after_secs;
        let delete = self.settings.delete_after_secs;

        let mut aged = Vec::new();
        let mut removed = Vec::new();
        for vessel in self.vessels.values_mut() {
            let idle = (now - vessel.updated_at).num_seconds();
            if idle > delete {
                removed.push(vessel.mmsi);
            } else if idle > grey && vessel.age == AgeState::Fresh {
                vessel.age = AgeState::Aging;
                aged.push(vessel.mmsi);
            }
        }

        for mmsi in aged {
            if let Some(vessel) = self.vessels.get(&mmsi) {
                if self.is_visible(vessel) {
                    self.emit(Notification::Old {
                        mmsi,
                        distance_km: vessel.distance_km,
                    });
                }
            }
        }
        for mmsi in removed {
            if let Some(vessel) = self.vessels.remove(&mmsi) {
                self.metadata_hashes.remove(&mmsi);
                if self.is_visible(&vessel) {
                    self.emit(Notification::Remove { mmsi });
                }
            }
        }
    }

    fn logged(&self, vessel: &VesselRecord) -> bool {
        vessel.class != TransponderClass::Base || self.settings.log_base_stations
    }

    /// Position rows for vessels updated since `since`, oldest first, plus an
    /// own-ship row when the own position is known.
    pub fn position_rows(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Vec<PositionRow> {
        let mut rows: Vec<PositionRow> = self
            .vessels
            .values()
            .filter(|v| v.updated_at >= since && self.logged(v))
            .filter_map(|v| {
                let (latitude, longitude) = v.position()?;
                Some(PositionRow {
                    time: v.updated_at,
                    mmsi: v.mmsi,
                    latitude,
                    longitude,
                    georef: v.georef.clone(),
                    sog: v.sog,
                    cog: v.cog,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.time.cmp(&b.time).then(a.mmsi.cmp(&b.mmsi)));

        if let Some(own) = &self.own_position {
            rows.push(PositionRow {
                time: now,
                mmsi: self.settings.own_mmsi,
                latitude: own.latitude,
                longitude: own.longitude,
                georef: georef(own.latitude, own.longitude),
                sog: own.sog,
                cog: own.cog,
            });
        }
        rows
    }

    /// Metadata rows for vessels whose identity fields changed since the
    /// previous call. Only vessels with an IMO number are considered.
    pub fn metadata_rows(&mut self, now: DateTime<Utc>) -> Vec<MetadataRow> {
        let mut hashes = AHashMap::new();
        let mut rows = Vec::new();

        for v in self.vessels.values() {
            if v.imo.is_none() || !self.logged(v) {
                continue;
            }
            let hash = self.hasher.hash_one(v.metadata_key());
            if self.metadata_hashes.get(&v.mmsi) != Some(&hash) {
                rows.push(MetadataRow {
                    time: now,
                    mmsi: v.mmsi,
                    imo: v.imo,
                    name: v.name.clone(),
                    ship_type: v.ship_type,
                    callsign: v.callsign.clone(),
                    destination: v.destination.clone(),
                    eta: v.eta.clone(),
                    length: v.length,
                    width: v.width,
                });
            }
            hashes.insert(v.mmsi, hash);
        }

        self.metadata_hashes = hashes;
        rows.sort_by_key(|r| r.mmsi);
        rows
    }

    /// Identity records changed since the last call.
    pub fn take_dirty_identities(&mut self) -> Vec<IdentityRecord> {
        let mut records: Vec<_> = self
            .dirty_identities
            .drain()
            .filter_map(|mmsi| self.identities.get(&mmsi).cloned())
            .collect();
        records.sort_by_key(|r| r.mmsi);
        records
    }

    pub fn vessel(&self, mmsi: u32) -> Option<&VesselRecord> {
        self.vessels.get(&mmsi)
    }

    pub fn identity(&self, mmsi: u32) -> Option<&IdentityRecord> {
        self.identities.get(&mmsi)
    }

    pub fn own_position(&self) -> Option<&OwnPosition> {
        self.own_position.as_ref()
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }
}

/// Periodic work of the registry task.
#[derive(Debug, Clone)]
pub struct RegistrySchedule {
    pub sweep_interval: Duration,
    pub log_interval: Duration,
    pub iddb_interval: Duration,
}

impl RegistrySchedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.general.sweep_interval_secs.max(1)),
            log_interval: Duration::from_secs(config.logging.interval_secs.max(1)),
            iddb_interval: Duration::from_secs(config.iddb.interval_secs.max(1)),
        }
    }
}

/// The registry together with its persistence sinks.
pub struct RegistryTask {
    pub registry: Registry,
    pub inbound: RegistryQueue,
    pub schedule: RegistrySchedule,
    pub log_store: Option<LogStore>,
    pub iddb: Option<IdDbStore>,
    pub remark_file: Option<PathBuf>,
}

impl RegistryTask {
    /// Runs until cancelled, then flushes pending identity records.
    pub async fn run(mut self, token: CancellationToken) -> Result<()> {
        let start = Instant::now();
        let mut sweep = interval_at(start + self.schedule.sweep_interval, self.schedule.sweep_interval);
        let mut log_tick = interval_at(start + self.schedule.log_interval, self.schedule.log_interval);
        let mut iddb_tick = interval_at(start + self.schedule.iddb_interval, self.schedule.iddb_interval);
        for tick in [&mut sweep, &mut log_tick, &mut iddb_tick] {
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        self.registry.announce_own_position();
        info!("Registry started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                command = self.inbound.pop() => self.handle(command).await,
                _ = sweep.tick() => self.isolated("sweep", |r| r.sweep(Utc::now())),
                _ = log_tick.tick(), if self.log_store.is_some() => self.export_logs().await,
                _ = iddb_tick.tick(), if self.iddb.is_some() => self.export_iddb().await,
            }
        }

        self.export_iddb().await;
        info!("Registry stopped with {} vessels", self.registry.len());
        Ok(())
    }

    async fn handle(&mut self, command: RegistryCommand) {
        let save = match (&command, &self.remark_file) {
            (RegistryCommand::ReplaceRemarks(remarks), Some(path)) => Some((remarks.clone(), path.clone())),
            _ => None,
        };
        let step = command_name(&command);
        self.isolated(step, |r| r.handle(command, Utc::now()));

        if let Some((remarks, path)) = save {
            if let Err(e) = alert::save_remark_file(&path, &remarks).await {
                error!("Saving remarks failed: {}", e);
            }
        }
    }

    /// Runs one step against the registry; a panic skips only that step.
    pub fn isolated(&mut self, step: &str, f: impl FnOnce(&mut Registry)) {
        if panic::catch_unwind(AssertUnwindSafe(|| f(&mut self.registry))).is_err() {
            error!("Registry skipped {} after a panic", step);
        }
    }

    async fn export_logs(&mut self) {
        let Some(store) = &self.log_store else {
            return;
        };
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.schedule.log_interval).unwrap_or(chrono::Duration::zero());
        let positions = self.registry.position_rows(now - window, now);
        let metadata = self.registry.metadata_rows(now);

        if let Err(e) = store.append_positions(&positions).await {
            error!("Position export failed: {}", e);
        }
        if let Err(e) = store.append_metadata(&metadata).await {
            error!("Metadata export failed: {}", e);
        }
        debug!("Exported {} position and {} metadata rows", positions.len(), metadata.len());
    }

    async fn export_iddb(&mut self) {
        let Some(store) = &self.iddb else {
            return;
        };
        let records = self.registry.take_dirty_identities();
        if records.is_empty() {
            return;
        }
        match store.upsert(&records).await {
            Ok(total) => debug!("Identity database now holds {} records", total),
            Err(e) => {
                error!("Identity database update failed: {}", e);
                self.registry.dirty_identities.extend(records.iter().map(|r| r.mmsi));
            }
        }
    }
}

fn command_name(command: &RegistryCommand) -> &'static str {
    match command {
        RegistryCommand::Vessel(_) => "vessel report",
        RegistryCommand::OwnPosition { .. } => "own position",
        RegistryCommand::OverridePosition { .. } => "position override",
        RegistryCommand::Query(_) => "query",
        RegistryCommand::QueryRemarks => "remark query",
        RegistryCommand::QueryIdDb => "identity query",
        RegistryCommand::ReplaceRemarks(_) => "remark replacement",
        RegistryCommand::Error(_) => "error passthrough",
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::alert::{parse_remarks, AlertMode};
    use crate::decode::VesselFields;
    use crate::router::create_queue;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
    }

    fn registry(settings: RegistrySettings) -> (Registry, NotificationQueue) {
        let queue: NotificationQueue = create_queue(100);
        (Registry::new(settings, Arc::new(Lookups::builtin()), queue.clone()), queue)
    }

    fn position(mmsi: u32, lat: f64, lon: f64) -> VesselReport {
        VesselReport {
            message_type: 1,
            mmsi,
            decoded: true,
            fields: VesselFields {
                latitude: Some(lat),
                longitude: Some(lon),
                sog: Some(12.3),
                ..Default::default()
            },
        }
    }

    fn tags(queue: &NotificationQueue) -> Vec<&'static str> {
        queue.drain().iter().map(Notification::tag).collect()
    }

    #[test]
    fn test_visibility_threshold() {
        let (mut reg, queue) = registry(RegistrySettings::default());
        let report = position(265547250, 57.7, 11.9);

        reg.apply_vessel(&report, at(0));
        reg.apply_vessel(&report, at(1));
        assert!(queue.is_empty());
        reg.apply_vessel(&report, at(2));
        assert_eq!(tags(&queue), vec!["insert"]);
        reg.apply_vessel(&report, at(3));
        assert_eq!(tags(&queue), vec!["update"]);
    }

    #[test]
    fn test_repeated_update_is_idempotent() {
        let (mut once, _) = registry(RegistrySettings::default());
        let (mut twice, _) = registry(RegistrySettings::default());
        let report = position(230000001, 60.1, 24.9);

        once.apply_vessel(&report, at(0));
        twice.apply_vessel(&report, at(0));
        twice.apply_vessel(&report, at(0));

        let a = once.vessel(230000001).expect("vessel").clone();
        let mut b = twice.vessel(230000001).expect("vessel").clone();
        assert_eq!(b.version_count, 2);
        b.version_count = a.version_count;
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsupported_type_and_low_mmsi_ignored() {
        let (mut reg, _) = registry(RegistrySettings::default());
        let mut report = position(265547250, 57.7, 11.9);
        report.message_type = 21;
        reg.apply_vessel(&report, at(0));
        reg.apply_vessel(&position(1, 57.7, 11.9), at(0));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_grey_emits_old_once_then_remove() {
        let settings = RegistrySettings {
            show_after_updates: 1,
            grey_after_secs: 600,
            delete_after_secs: 3600,
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        reg.apply_vessel(&position(265547250, 57.7, 11.9), at(0));
        queue.drain();

        reg.sweep(at(601));
        assert_eq!(tags(&queue), vec!["old"]);
        reg.sweep(at(611));
        assert!(queue.is_empty());
        assert_eq!(reg.vessel(265547250).expect("still tracked").age, AgeState::Aging);

        reg.apply_vessel(&position(265547250, 57.7, 11.9), at(700));
        assert_eq!(reg.vessel(265547250).expect("tracked").age, AgeState::Fresh);
        queue.drain();

        reg.sweep(at(4301));
        assert_eq!(tags(&queue), vec!["remove"]);
        assert!(reg.vessel(265547250).is_none());
    }

    #[test]
    fn test_never_visible_vessel_expires_silently() {
        let settings = RegistrySettings {
            show_after_updates: 3,
            grey_after_secs: 600,
            delete_after_secs: 3600,
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        reg.apply_vessel(&position(265547250, 57.7, 11.9), at(0));

        reg.sweep(at(601));
        assert!(queue.is_empty());
        assert_eq!(reg.vessel(265547250).expect("still tracked").age, AgeState::Aging);

        reg.sweep(at(3601));
        assert!(queue.is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_sound_alert_rearms_after_leaving_range() {
        let settings = RegistrySettings {
            show_after_updates: 1,
            max_distance_km: Some(10.0),
            position_override: Some((57.0, 12.0)),
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        reg.set_remarks(parse_remarks("265547250,AS,watch\n"));

        let fired = |reg: &mut Registry, lat: f64| {
            reg.apply_vessel(&position(265547250, lat, 12.0), at(0));
            queue.drain().into_iter().any(|n| match n {
                Notification::Insert { view } | Notification::Update { view } => view.sound_alert,
                _ => false,
            })
        };

        assert!(fired(&mut reg, 57.01));
        assert!(!fired(&mut reg, 57.02));
        assert!(!fired(&mut reg, 58.0));
        assert!(fired(&mut reg, 57.03));
    }

    #[test]
    fn test_query_is_tagged_and_never_sounds() {
        let settings = RegistrySettings {
            show_after_updates: 1,
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        reg.handle(RegistryCommand::Query(265547250), at(0));
        assert!(queue.is_empty());

        reg.set_remarks(parse_remarks("265547250,AS,x\n"));
        reg.handle(RegistryCommand::Query(265547250), at(0));
        reg.apply_vessel(&position(265547250, 57.7, 11.9), at(0));
        queue.drain();

        reg.handle(RegistryCommand::Query(265547250), at(1));
        match queue.drain().as_slice() {
            [Notification::Query { view }] => {
                assert!(!view.sound_alert);
                assert_eq!(view.remark.as_deref(), Some("x"));
            }
            other => panic!("unexpected notifications {:?}", other),
        }
    }

    #[test]
    fn test_identity_kept_after_removal_and_used_as_fallback() {
        let settings = RegistrySettings {
            show_after_updates: 1,
            grey_after_secs: 10,
            delete_after_secs: 20,
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        let statics = VesselReport {
            message_type: 5,
            mmsi: 369190000,
            decoded: true,
            fields: VesselFields {
                imo: Some(6710932),
                name: Some("MT.MITCHELL".into()),
                callsign: Some("WDA9674".into()),
                ..Default::default()
            },
        };
        reg.apply_vessel(&statics, at(0));
        reg.sweep(at(30));
        assert!(reg.vessel(369190000).is_none());
        assert_eq!(reg.identity(369190000).and_then(|i| i.imo), Some(6710932));
        queue.drain();

        reg.apply_vessel(&position(369190000, 47.6, -122.3), at(40));
        match queue.drain().as_slice() {
            [Notification::Insert { view }] => {
                let identity = view.identity.as_ref().expect("identity fallback");
                assert_eq!(identity.name.as_deref(), Some("MT.MITCHELL"));
            }
            other => panic!("unexpected notifications {:?}", other),
        }
        assert_eq!(reg.take_dirty_identities().len(), 1);
        assert!(reg.take_dirty_identities().is_empty());
    }

    #[test]
    fn test_hidden_base_stations_not_emitted() {
        let settings = RegistrySettings {
            show_after_updates: 1,
            show_base_stations: false,
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        let mut report = position(2655000, 57.7, 11.9);
        report.message_type = 4;
        reg.apply_vessel(&report, at(0));
        assert!(queue.is_empty());
        assert!(reg.vessel(2655000).is_some());
    }

    #[test]
    fn test_override_ignores_decoded_fixes() {
        let settings = RegistrySettings {
            position_override: Some((57.0, 12.0)),
            ..Default::default()
        };
        let (mut reg, queue) = registry(settings);
        reg.announce_own_position();
        reg.handle(
            RegistryCommand::OwnPosition {
                latitude: 1.0,
                longitude: 1.0,
                sog: None,
                cog: None,
                source: "gps".into(),
            },
            at(0),
        );
        assert_eq!(tags(&queue), vec!["own_position"]);
        assert_eq!(reg.own_position().map(|p| p.source.as_str()), Some(MANUAL_SOURCE));
    }

    #[test]
    fn test_own_position_carries_course_and_speed() {
        let (mut reg, queue) = registry(RegistrySettings::default());
        reg.handle(
            RegistryCommand::OwnPosition {
                latitude: 57.7,
                longitude: 11.9,
                sog: Some(5.2),
                cog: Some(271.0),
                source: "gps".into(),
            },
            at(5),
        );
        match queue.drain().as_slice() {
            [Notification::OwnPosition { sog, cog, georef, source, time, .. }] => {
                assert_eq!((*sog, *cog), (Some(5.2), Some(271.0)));
                assert_eq!(georef.as_deref(), crate::geo::georef(57.7, 11.9).as_deref());
                assert!(georef.is_some());
                assert_eq!(source, "gps");
                assert_eq!(*time, at(5));
            }
            other => panic!("unexpected notifications {:?}", other),
        }

        let rows = reg.position_rows(at(0), at(10));
        let own = rows.last().expect("own-ship row");
        assert_eq!((own.sog, own.cog), (Some(5.2), Some(271.0)));
    }

    #[test]
    fn test_metadata_rows_only_on_change() {
        let (mut reg, _) = registry(RegistrySettings::default());
        let mut statics = VesselReport {
            message_type: 5,
            mmsi: 369190000,
            decoded: true,
            fields: VesselFields {
                imo: Some(6710932),
                destination: Some("SEATTLE".into()),
                ..Default::default()
            },
        };
        reg.apply_vessel(&statics, at(0));
        reg.apply_vessel(&position(265547250, 57.7, 11.9), at(0));

        assert_eq!(reg.metadata_rows(at(1)).len(), 1);
        assert!(reg.metadata_rows(at(2)).is_empty());

        statics.fields.destination = Some("TACOMA".into());
        reg.apply_vessel(&statics, at(3));
        let rows = reg.metadata_rows(at(4));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].destination.as_deref(), Some("TACOMA"));
    }

    #[test]
    fn test_position_rows_window_and_own_ship() {
        let settings = RegistrySettings {
            position_override: Some((57.0, 12.0)),
            own_mmsi: 7,
            ..Default::default()
        };
        let (mut reg, _) = registry(settings);
        reg.apply_vessel(&position(265547250, 57.7, 11.9), at(0));
        reg.apply_vessel(&position(230000001, 60.1, 24.9), at(100));

        let rows = reg.position_rows(at(50), at(120));
        let mmsis: Vec<_> = rows.iter().map(|r| r.mmsi).collect();
        assert_eq!(mmsis, vec![230000001, 7]);
        assert_eq!(reg.vessel(230000001).and_then(|v| v.sog), Some(12.3));
    }

    #[test]
    fn test_remark_queries() {
        let (mut reg, queue) = registry(RegistrySettings::default());
        reg.handle(RegistryCommand::ReplaceRemarks(parse_remarks("1,A,a\n2,,b\n")), at(0));
        reg.handle(RegistryCommand::QueryRemarks, at(0));
        match queue.drain().as_slice() {
            [Notification::RemarkDict { remarks }] => {
                assert_eq!(remarks.len(), 2);
                assert_eq!(remarks[&1].mode, AlertMode::Silent);
            }
            other => panic!("unexpected notifications {:?}", other),
        }
    }

    #[test]
    fn test_panicking_step_leaves_registry_usable() {
        let settings = RegistrySettings {
            show_after_updates: 1,
            ..RegistrySettings::default()
        };
        let (reg, queue) = registry(settings);
        let mut task = RegistryTask {
            registry: reg,
            inbound: create_queue(10),
            schedule: RegistrySchedule::from_config(&Config::default()),
            log_store: None,
            iddb: None,
            remark_file: None,
        };

        task.isolated("test step", |_| panic!("registry bug"));
        task.isolated("vessel report", |r| r.apply_vessel(&position(265547250, 57.7, 11.9), at(0)));
        assert_eq!(tags(&queue), vec!["insert"]);
        assert_eq!(task.registry.len(), 1);
    }
}
