//! Alert and remark dictionary.
//!
//! The remark file holds one `mmsi,mode,text` record per line, where mode is
//! empty (remark only), `A` (silent alert) or `AS` (alert with sound).

use crate::error::{LoggerError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AlertMode {
    #[default]
    None,
    Silent,
    Sound,
}

impl AlertMode {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "" => Some(AlertMode::None),
            "A" => Some(AlertMode::Silent),
            "AS" => Some(AlertMode::Sound),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AlertMode::None => "",
            AlertMode::Silent => "A",
            AlertMode::Sound => "AS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemarkEntry {
    pub mmsi: u32,
    pub mode: AlertMode,
    pub remark: String,
}

/// Remark dictionary keyed by MMSI, ordered for stable file output.
pub type RemarkDict = BTreeMap<u32, RemarkEntry>;

/// Parses remark file content. Malformed lines are skipped with a warning;
/// a later line for the same MMSI replaces an earlier one.
pub fn parse_remarks(content: &str) -> RemarkDict {
    let mut dict = RemarkDict::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let mut cols = line.splitn(3, ',');
        let mmsi = cols.next().and_then(|c| c.trim().parse::<u32>().ok());
        let mode = cols.next().and_then(AlertMode::parse);
        match (mmsi, mode) {
            (Some(mmsi), Some(mode)) => {
                let remark = cols.next().unwrap_or("").trim().to_string();
                dict.insert(mmsi, RemarkEntry { mmsi, mode, remark });
            }
            _ => warn!("Skipping malformed remark line {}: {:?}", lineno + 1, line),
        }
    }
    dict
}

pub fn format_remarks(dict: &RemarkDict) -> String {
    let mut out = String::new();
    for entry in dict.values() {
        out.push_str(&format!("{},{},{}\n", entry.mmsi, entry.mode.code(), entry.remark));
    }
    out
}

pub async fn load_remark_file(path: &Path) -> Result<RemarkDict> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoggerError::storage(path.display().to_string(), e))?;
    let dict = parse_remarks(&content);
    debug!("Loaded {} remarks from {}", dict.len(), path.display());
    Ok(dict)
}

/// Writes the dictionary through a temporary file and renames it into place.
pub async fn save_remark_file(path: &Path, dict: &RemarkDict) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let storage_err = |e| LoggerError::storage(path.display().to_string(), e);
    tokio::fs::write(&tmp, format_remarks(dict)).await.map_err(storage_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(storage_err)?;
    Ok(())
}

/// Outcome of evaluating one update against the remark dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertOutcome {
    pub alert: bool,
    pub sound: bool,
}

/// Alert rules for one vessel update.
///
/// Range is `distance <= max_distance_km`; without a max distance, or while
/// the distance is unknown, the vessel counts as in range. A sound alert
/// fires once and is re-armed when the vessel leaves the range. Queries pass
/// `allow_sound = false` and never fire it.
pub fn evaluate(
    mode: AlertMode,
    distance_km: Option<f64>,
    max_distance_km: Option<f64>,
    sound_alerted: &mut bool,
    allow_sound: bool,
) -> AlertOutcome {
    let in_range = match (max_distance_km, distance_km) {
        (Some(max), Some(d)) => d <= max,
        _ => true,
    };

    match mode {
        AlertMode::None => AlertOutcome::default(),
        AlertMode::Silent => AlertOutcome {
            alert: in_range,
            sound: false,
        },
        AlertMode::Sound => {
            if !in_range {
                *sound_alerted = false;
                return AlertOutcome::default();
            }
            let sound = allow_sound && !*sound_alerted;
            if sound {
                *sound_alerted = true;
            }
            AlertOutcome { alert: true, sound }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let dict = parse_remarks("265547250,AS,Ferry, the big one\n230000000,,note\nbad\n1,X,y\n");
        assert_eq!(dict.len(), 2);
        assert_eq!(dict[&265547250].mode, AlertMode::Sound);
        assert_eq!(dict[&265547250].remark, "Ferry, the big one");
        assert_eq!(dict[&230000000].mode, AlertMode::None);
        assert_eq!(
            format_remarks(&dict),
            "230000000,,note\n265547250,AS,Ferry, the big one\n"
        );
    }

    #[test]
    fn test_sound_rearms_only_after_leaving_range() {
        let mut flag = false;
        let max = Some(10.0);
        let fire = |d: f64, flag: &mut bool| evaluate(AlertMode::Sound, Some(d), max, flag, true).sound;

        assert!(fire(5.0, &mut flag));
        assert!(!fire(4.0, &mut flag));
        assert!(!fire(9.9, &mut flag));
        assert!(!fire(12.0, &mut flag));
        assert!(fire(8.0, &mut flag));
    }

    #[test]
    fn test_sound_without_range_fires_once() {
        let mut flag = false;
        assert!(evaluate(AlertMode::Sound, None, None, &mut flag, true).sound);
        assert!(!evaluate(AlertMode::Sound, Some(500.0), None, &mut flag, true).sound);
    }

    #[test]
    fn test_silent_gated_by_distance() {
        let mut flag = false;
        let near = evaluate(AlertMode::Silent, Some(1.0), Some(2.0), &mut flag, true);
        let far = evaluate(AlertMode::Silent, Some(3.0), Some(2.0), &mut flag, true);
        assert!(near.alert && !near.sound);
        assert!(!far.alert);
    }

    #[test]
    fn test_query_never_sounds() {
        let mut flag = false;
        let outcome = evaluate(AlertMode::Sound, Some(1.0), Some(2.0), &mut flag, false);
        assert!(outcome.alert);
        assert!(!outcome.sound);
        assert!(!flag);
    }

    #[tokio::test]
    async fn test_remark_file_round_trip_on_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("remarks.txt");
        let dict = parse_remarks("1,A,one\n");
        save_remark_file(&path, &dict).await.expect("save");
        assert_eq!(load_remark_file(&path).await.expect("load"), dict);
    }
}
