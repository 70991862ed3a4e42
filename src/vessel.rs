//! Vessel and identity records held by the registry.

use crate::decode::VesselFields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transponder class a message type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransponderClass {
    A,
    B,
    Base,
}

impl TransponderClass {
    /// Classifies an AIS message type; `None` for types the registry ignores.
    pub fn from_message_type(message_type: u8) -> Option<Self> {
        match message_type {
            1 | 2 | 3 | 5 => Some(TransponderClass::A),
            4 => Some(TransponderClass::Base),
            18 | 19 | 24 => Some(TransponderClass::B),
            _ => None,
        }
    }
}

impl fmt::Display for TransponderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransponderClass::A => f.write_str("A"),
            TransponderClass::B => f.write_str("B"),
            TransponderClass::Base => f.write_str("Base"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgeState {
    Fresh,
    Aging,
}

/// Slow-changing identity of a station, kept independently of the vessel
/// table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub mmsi: u32,
    pub imo: Option<u32>,
    pub name: Option<String>,
    pub callsign: Option<String>,
}

impl IdentityRecord {
    /// Overwrites with the given values; `None` keeps the stored one.
    pub fn merge(&mut self, imo: Option<u32>, name: Option<&str>, callsign: Option<&str>) {
        if imo.is_some() {
            self.imo = imo;
        }
        if let Some(name) = name {
            self.name = Some(name.to_string());
        }
        if let Some(callsign) = callsign {
            self.callsign = Some(callsign.to_string());
        }
    }
}

/// Everything known about one vessel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselRecord {
    pub mmsi: u32,
    pub class: TransponderClass,
    pub last_message_type: u8,
    pub nation: Option<String>,

    pub imo: Option<u32>,
    pub name: Option<String>,
    pub callsign: Option<String>,
    pub ship_type: Option<u8>,
    pub type_name: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    pub length: Option<u16>,
    pub width: Option<u16>,
    pub draught: Option<f64>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<u16>,
    pub rot: Option<f64>,
    pub nav_status: Option<u8>,
    pub position_accuracy: Option<bool>,

    pub distance_km: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub georef: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version_count: u64,
    pub age: AgeState,
    /// In alert range with an active alert.
    pub alert: bool,
    /// Sound alert fired and not yet re-armed.
    pub sound_alerted: bool,
}

macro_rules! merge_fields {
    ($dst:expr, $src:expr, [$($field:ident),* $(,)?]) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field.clone();
            }
        )*
    };
}

impl VesselRecord {
    pub fn new(mmsi: u32, class: TransponderClass, message_type: u8, now: DateTime<Utc>) -> Self {
        Self {
            mmsi,
            class,
            last_message_type: message_type,
            nation: None,
            imo: None,
            name: None,
            callsign: None,
            ship_type: None,
            type_name: None,
            destination: None,
            eta: None,
            length: None,
            width: None,
            draught: None,
            latitude: None,
            longitude: None,
            sog: None,
            cog: None,
            heading: None,
            rot: None,
            nav_status: None,
            position_accuracy: None,
            distance_km: None,
            bearing_deg: None,
            georef: None,
            created_at: now,
            updated_at: now,
            version_count: 0,
            age: AgeState::Fresh,
            alert: false,
            sound_alerted: false,
        }
    }

    /// Copies every field present in `fields`. Absent fields never clear
    /// known values. Digits are stripped from the destination.
    pub fn merge(&mut self, fields: &VesselFields) {
        merge_fields!(
            self,
            fields,
            [
                imo,
                name,
                callsign,
                ship_type,
                destination,
                eta,
                length,
                width,
                draught,
                latitude,
                longitude,
                sog,
                cog,
                heading,
                rot,
                nav_status,
                position_accuracy,
            ]
        );
        if let Some(destination) = self.destination.as_mut() {
            destination.retain(|c| !c.is_ascii_digit());
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    /// Identity fields that go into the metadata export.
    pub fn metadata_key(&self) -> MetadataKey<'_> {
        MetadataKey {
            imo: self.imo,
            name: self.name.as_deref(),
            ship_type: self.ship_type,
            callsign: self.callsign.as_deref(),
            destination: self.destination.as_deref(),
            eta: self.eta.as_deref(),
            length: self.length,
            width: self.width,
        }
    }
}

/// Hashable view of the exported identity fields.
#[derive(Debug, Hash)]
pub struct MetadataKey<'a> {
    pub imo: Option<u32>,
    pub name: Option<&'a str>,
    pub ship_type: Option<u8>,
    pub callsign: Option<&'a str>,
    pub destination: Option<&'a str>,
    pub eta: Option<&'a str>,
    pub length: Option<u16>,
    pub width: Option<u16>,
}

/// Vessel as emitted to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselView {
    pub vessel: VesselRecord,
    /// Stored identity, for filling in fields the vessel has not sent yet.
    pub identity: Option<IdentityRecord>,
    pub remark: Option<String>,
    /// Sound alert fired by this update.
    pub sound_alert: bool,
}
