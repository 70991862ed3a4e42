//! Tagged events emitted by the registry for the presentation layer.

use crate::alert::RemarkDict;
use crate::queue::DropOldestQueue;
use crate::vessel::{IdentityRecord, VesselView};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// First visible emission of a vessel.
    Insert { view: Box<VesselView> },
    Update { view: Box<VesselView> },
    /// Answer to a point query.
    Query { view: Box<VesselView> },
    /// Vessel went idle past the grey threshold.
    Old { mmsi: u32, distance_km: Option<f64> },
    Remove { mmsi: u32 },
    /// Own-station fix with course and speed when the source reports them.
    OwnPosition {
        latitude: f64,
        longitude: f64,
        sog: Option<f64>,
        cog: Option<f64>,
        georef: Option<String>,
        source: String,
        time: DateTime<Utc>,
    },
    #[serde(rename = "remarkdict")]
    RemarkDict { remarks: RemarkDict },
    #[serde(rename = "iddb")]
    IdDb { identities: Vec<IdentityRecord> },
    Error { message: String },
}

impl Notification {
    pub fn tag(&self) -> &'static str {
        match self {
            Notification::Insert { .. } => "insert",
            Notification::Update { .. } => "update",
            Notification::Query { .. } => "query",
            Notification::Old { .. } => "old",
            Notification::Remove { .. } => "remove",
            Notification::OwnPosition { .. } => "own_position",
            Notification::RemarkDict { .. } => "remarkdict",
            Notification::IdDb { .. } => "iddb",
            Notification::Error { .. } => "error",
        }
    }

    /// MMSI the event is about, if any.
    pub fn mmsi(&self) -> Option<u32> {
        match self {
            Notification::Insert { view } | Notification::Update { view } | Notification::Query { view } => {
                Some(view.vessel.mmsi)
            }
            Notification::Old { mmsi, .. } | Notification::Remove { mmsi } => Some(*mmsi),
            _ => None,
        }
    }
}

pub type NotificationQueue = Arc<DropOldestQueue<Notification>>;

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag_matches() {
        let events = [
            Notification::Old {
                mmsi: 1,
                distance_km: Some(2.5),
            },
            Notification::RemarkDict {
                remarks: RemarkDict::new(),
            },
            Notification::IdDb { identities: vec![] },
            Notification::Error {
                message: "x".into(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).expect("serializable");
            assert_eq!(json["type"], event.tag());
        }
    }
}
