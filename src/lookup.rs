//! Static lookup tables: MID → nation and ship type code → type name.
//!
//! Built once at startup and shared read-only (`Arc<Lookups>`) with the
//! registry. Files use one `code,value` pair per line; lines that do not
//! split are skipped.

use crate::error::{LoggerError, Result};
use ahash::AHashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Read-only lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    mid: AHashMap<String, String>,
    typecode: AHashMap<u8, String>,
}

impl Lookups {
    /// Tables with the built-in ship type names and a small MID set.
    pub fn builtin() -> Self {
        let mut lookups = Self::default();
        for (mid, nation) in BUILTIN_MID {
            lookups.mid.insert((*mid).to_string(), (*nation).to_string());
        }
        for code in 20..=99u8 {
            if let Some(name) = builtin_type_name(code) {
                lookups.typecode.insert(code, name.to_string());
            }
        }
        lookups
    }

    /// Loads tables from optional files on top of the built-in defaults.
    ///
    /// A file that cannot be read is reported and the defaults are kept.
    pub async fn load(mid_file: Option<&Path>, typecode_file: Option<&Path>) -> Self {
        let mut lookups = Self::builtin();

        if let Some(path) = mid_file {
            match read_pairs(path).await {
                Ok(pairs) => {
                    debug!("Loaded {} MID entries from {}", pairs.len(), path.display());
                    lookups.mid.extend(pairs);
                }
                Err(e) => warn!("Could not read MID file: {}", e),
            }
        }

        if let Some(path) = typecode_file {
            match read_pairs(path).await {
                Ok(pairs) => {
                    let before = lookups.typecode.len();
                    for (code, name) in pairs {
                        if let Ok(code) = code.parse::<u8>() {
                            lookups.typecode.insert(code, name);
                        }
                    }
                    debug!(
                        "Type code table now has {} entries ({} before {})",
                        lookups.typecode.len(),
                        before,
                        path.display()
                    );
                }
                Err(e) => warn!("Could not read type code file: {}", e),
            }
        }

        lookups
    }

    /// Nation code for an MMSI, resolved from its first three digits.
    pub fn nation(&self, mmsi: u32) -> Option<&str> {
        let digits = mmsi.to_string();
        digits.get(..3).and_then(|mid| self.mid.get(mid)).map(String::as_str)
    }

    /// Human-readable name for a ship type code.
    pub fn type_name(&self, code: u8) -> Option<&str> {
        if code == 0 {
            return None;
        }
        self.typecode.get(&code).map(String::as_str)
    }

    /// Adds or replaces a MID entry.
    pub fn insert_mid(&mut self, mid: impl Into<String>, nation: impl Into<String>) {
        self.mid.insert(mid.into(), nation.into());
    }
}

/// Parses `code,value[,...]` lines.
pub fn parse_pairs(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let mut cols = line.trim().split(',');
            let code = cols.next()?.trim();
            let value = cols.next()?.trim();
            (!code.is_empty() && !value.is_empty()).then(|| (code.to_string(), value.to_string()))
        })
        .collect()
}

async fn read_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoggerError::storage(path.display().to_string(), e))?;
    Ok(parse_pairs(&content))
}

fn builtin_type_name(code: u8) -> Option<&'static str> {
    Some(match code {
        20..=29 => "Wing in ground",
        30 => "Fishing",
        31 | 32 => "Towing",
        33 => "Dredging",
        34 => "Diving",
        35 => "Military",
        36 => "Sailing",
        37 => "Pleasure craft",
        40..=49 => "High-speed craft",
        50 => "Pilot vessel",
        51 => "Search and rescue",
        52 => "Tug",
        53 => "Port tender",
        54 => "Anti-pollution",
        55 => "Law enforcement",
        58 => "Medical transport",
        59 => "Non-combatant",
        60..=69 => "Passenger",
        70..=79 => "Cargo",
        80..=89 => "Tanker",
        90..=99 => "Other",
        _ => return None,
    })
}

const BUILTIN_MID: &[(&str, &str)] = &[
    ("211", "DE"),
    ("218", "DE"),
    ("219", "DK"),
    ("220", "DK"),
    ("230", "FI"),
    ("232", "GB"),
    ("233", "GB"),
    ("234", "GB"),
    ("235", "GB"),
    ("244", "NL"),
    ("245", "NL"),
    ("246", "NL"),
    ("257", "NO"),
    ("258", "NO"),
    ("259", "NO"),
    ("265", "SE"),
    ("266", "SE"),
    ("276", "EE"),
    ("338", "US"),
    ("366", "US"),
    ("367", "US"),
    ("368", "US"),
    ("369", "US"),
    ("477", "HK"),
];
