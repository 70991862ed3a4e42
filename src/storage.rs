//! Persistence sinks: CSV exports and the identity database.
//!
//! `position.csv` and `metadata.csv` are append-only; the header is written
//! when a file is created. The identity database is a JSON array of
//! [`IdentityRecord`]s rewritten atomically on every upsert.

use crate::error::{LoggerError, Result};
use crate::vessel::IdentityRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const POSITION_FILE: &str = "position.csv";
pub const METADATA_FILE: &str = "metadata.csv";

const POSITION_HEADER: &str = "time,mmsi,latitude,longitude,georef,sog,cog";
const METADATA_HEADER: &str = "time,mmsi,imo,name,type,callsign,destination,eta,length,width";

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub time: DateTime<Utc>,
    pub mmsi: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub georef: Option<String>,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub time: DateTime<Utc>,
    pub mmsi: u32,
    pub imo: Option<u32>,
    pub name: Option<String>,
    pub ship_type: Option<u8>,
    pub callsign: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    pub length: Option<u16>,
    pub width: Option<u16>,
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn text(value: &Option<String>) -> String {
    match value {
        Some(v) if v.contains(&[',', '"', '\n'][..]) => format!("\"{}\"", v.replace('"', "\"\"")),
        Some(v) => v.clone(),
        None => String::new(),
    }
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl PositionRow {
    fn to_csv(&self) -> String {
        format!(
            "{},{},{:.6},{:.6},{},{},{}",
            timestamp(&self.time),
            self.mmsi,
            self.latitude,
            self.longitude,
            text(&self.georef),
            opt(&self.sog),
            opt(&self.cog)
        )
    }
}

impl MetadataRow {
    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            timestamp(&self.time),
            self.mmsi,
            opt(&self.imo),
            text(&self.name),
            opt(&self.ship_type),
            text(&self.callsign),
            text(&self.destination),
            text(&self.eta),
            opt(&self.length),
            opt(&self.width)
        )
    }
}

/// Appends export rows to the CSV files in one directory.
#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn append_positions(&self, rows: &[PositionRow]) -> Result<()> {
        let lines: Vec<String> = rows.iter().map(PositionRow::to_csv).collect();
        self.append(POSITION_FILE, POSITION_HEADER, &lines).await
    }

    pub async fn append_metadata(&self, rows: &[MetadataRow]) -> Result<()> {
        let lines: Vec<String> = rows.iter().map(MetadataRow::to_csv).collect();
        self.append(METADATA_FILE, METADATA_HEADER, &lines).await
    }

    async fn append(&self, file: &str, header: &str, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let path = self.dir.join(file);
        let storage_err = |e| LoggerError::storage(path.display().to_string(), e);

        fs::create_dir_all(&self.dir).await.map_err(storage_err)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(storage_err)?;

        let mut out = String::new();
        if f.metadata().await.map_err(storage_err)?.len() == 0 {
            out.push_str(header);
            out.push('\n');
        }
        for line in lines {
            let _ = writeln!(out, "{}", line);
        }
        f.write_all(out.as_bytes()).await.map_err(storage_err)?;
        f.flush().await.map_err(storage_err)?;
        debug!("Appended {} rows to {}", lines.len(), path.display());
        Ok(())
    }
}

/// Identity database keyed by MMSI.
#[derive(Debug, Clone)]
pub struct IdDbStore {
    path: PathBuf,
}

impl IdDbStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records; a missing file is an empty database.
    pub async fn load(&self) -> Result<Vec<IdentityRecord>> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LoggerError::storage(self.path.display().to_string(), e)),
        }
    }

    /// Inserts or replaces `records` by MMSI and rewrites the file.
    ///
    /// Returns the number of records in the database afterwards.
    pub async fn upsert(&self, records: &[IdentityRecord]) -> Result<usize> {
        let mut all: BTreeMap<u32, IdentityRecord> =
            self.load().await?.into_iter().map(|r| (r.mmsi, r)).collect();
        for record in records {
            all.insert(record.mmsi, record.clone());
        }

        let values: Vec<&IdentityRecord> = all.values().collect();
        let data = serde_json::to_vec_pretty(&values)?;

        let storage_err = |e| LoggerError::storage(self.path.display().to_string(), e);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(storage_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data).await.map_err(storage_err)?;
        fs::rename(&tmp, &self.path).await.map_err(storage_err)?;
        Ok(all.len())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn test_csv_quoting() {
        let row = MetadataRow {
            time: at(0),
            mmsi: 1,
            imo: None,
            name: Some("A, \"B\"".into()),
            ship_type: Some(70),
            callsign: None,
            destination: None,
            eta: None,
            length: Some(100),
            width: None,
        };
        assert_eq!(
            row.to_csv(),
            "1970-01-01T00:00:00Z,1,,\"A, \"\"B\"\"\",70,,,,100,"
        );
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LogStore::new(dir.path().join("logs"));
        let row = PositionRow {
            time: at(60),
            mmsi: 265547250,
            latitude: 57.5,
            longitude: 11.9,
            georef: None,
            sog: Some(10.5),
            cog: None,
        };
        store.append_positions(&[row.clone()]).await.expect("append");
        store.append_positions(&[row]).await.expect("append");
        store.append_positions(&[]).await.expect("empty append");

        let content = fs::read_to_string(store.dir().join(POSITION_FILE))
            .await
            .expect("read back");
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], POSITION_HEADER);
        assert_eq!(lines[1], "1970-01-01T00:01:00Z,265547250,57.500000,11.900000,,10.5,");
    }
}
