//! Per-source counters and their history over time.
//!
//! The hub is the only writer of [`StatsTable`]; the handle and the stats
//! reporter read snapshots. Counts are monitoring data, so readers may see
//! a table that is a few records behind.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Counters for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Raw records read from the source, fragments included.
    pub received: u64,
    /// Records that decoded into a usable structure.
    pub parsed: u64,
}

/// Shared per-source counters.
#[derive(Debug, Default)]
pub struct StatsTable {
    sources: RwLock<AHashMap<String, SourceStats>>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one raw record, creating the entry on first sight.
    pub fn record_received(&self, source: &str) {
        let mut sources = self.sources.write();
        match sources.get_mut(source) {
            Some(s) => s.received += 1,
            None => {
                sources.insert(
                    source.to_string(),
                    SourceStats {
                        received: 1,
                        parsed: 0,
                    },
                );
            }
        }
    }

    pub fn record_parsed(&self, source: &str) {
        if let Some(s) = self.sources.write().get_mut(source) {
            s.parsed += 1;
        }
    }

    pub fn get(&self, source: &str) -> Option<SourceStats> {
        self.sources.read().get(source).copied()
    }

    /// Copy of all counters, sorted by source name.
    pub fn snapshot(&self) -> Vec<(String, SourceStats)> {
        let mut all: Vec<_> = self
            .sources
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Sum over all sources, stamped with `timestamp` (unix seconds).
    pub fn totals(&self, timestamp: u64) -> StatsSample {
        let sources = self.sources.read();
        StatsSample {
            timestamp,
            received: sources.values().map(|s| s.received).sum(),
            parsed: sources.values().map(|s| s.parsed).sum(),
        }
    }
}

/// Cumulative totals at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSample {
    pub timestamp: u64,
    pub received: u64,
    pub parsed: u64,
}

/// Simple Stats buffer history
pub struct StatsHistory {
    /// Recent N seconds samples
    pub samples: VecDeque<StatsSample>,
    /// Max retention time in seconds
    pub max_age_secs: u64,
}

impl StatsHistory {
    /// Creates a new `StatsHistory` with the specified maximum retention time.
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            max_age_secs,
        }
    }

    /// Add sample and clean up old data.
    pub fn push(&mut self, sample: StatsSample) {
        self.samples.push_back(sample);

        if let Some(latest) = self.samples.back() {
            let cutoff = latest.timestamp.saturating_sub(self.max_age_secs);
            while let Some(oldest) = self.samples.front() {
                if oldest.timestamp < cutoff {
                    self.samples.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Rates over the last `window_secs`, computed from the oldest and newest
    /// sample inside the window.
    pub fn aggregate(&self, window_secs: u64) -> Option<AggregatedStats> {
        let latest = self.samples.back()?;
        let cutoff = latest.timestamp.saturating_sub(window_secs);

        // Timestamps are monotonic, so the window start can be binary searched.
        let start_idx = self.samples.partition_point(|s| s.timestamp < cutoff);
        let first = self.samples.get(start_idx)?;

        let received = latest.received.saturating_sub(first.received);
        let parsed = latest.parsed.saturating_sub(first.parsed);
        let elapsed = latest.timestamp.saturating_sub(first.timestamp);

        Some(AggregatedStats {
            received,
            parsed,
            received_per_sec: if elapsed > 0 {
                received as f64 / elapsed as f64
            } else {
                0.0
            },
            parse_ratio: if received > 0 {
                parsed as f64 / received as f64
            } else {
                0.0
            },
            sample_count: self.samples.len() - start_idx,
        })
    }
}

/// Counter deltas over a window.
#[derive(Debug)]
pub struct AggregatedStats {
    /// Records received in the window
    pub received: u64,
    /// Records parsed in the window
    pub parsed: u64,
    pub received_per_sec: f64,
    /// `parsed / received` in the window
    pub parse_ratio: f64,
    /// Number of samples in the window
    pub sample_count: usize,
}
