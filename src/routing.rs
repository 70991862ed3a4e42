//! Static routing table: which relay sinks each source fans out to.
//!
//! Built once at startup from per-source relay flags and never mutated, so
//! the hub can share it behind a plain `Arc` without locking.

use crate::config::Config;
use ahash::AHashMap;
use std::fmt;

/// A relay destination for raw traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// The serial relay server (second serial device).
    SerialRelay,
    /// The network relay server (all connected TCP clients).
    NetworkRelay,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::SerialRelay => f.write_str("serial"),
            SinkKind::NetworkRelay => f.write_str("network"),
        }
    }
}

/// Set of sinks a source relays to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSet {
    serial: bool,
    network: bool,
}

impl SinkSet {
    /// Empty set.
    pub const NONE: SinkSet = SinkSet {
        serial: false,
        network: false,
    };

    pub fn insert(&mut self, sink: SinkKind) {
        match sink {
            SinkKind::SerialRelay => self.serial = true,
            SinkKind::NetworkRelay => self.network = true,
        }
    }

    pub fn contains(&self, sink: SinkKind) -> bool {
        match sink {
            SinkKind::SerialRelay => self.serial,
            SinkKind::NetworkRelay => self.network,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.serial && !self.network
    }

    /// Sinks in a fixed order (serial first).
    pub fn iter(&self) -> impl Iterator<Item = SinkKind> {
        [
            self.serial.then_some(SinkKind::SerialRelay),
            self.network.then_some(SinkKind::NetworkRelay),
        ]
        .into_iter()
        .flatten()
    }
}

/// Relay flags of one source, the input to [`RoutingTable::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFlags {
    pub source: String,
    pub to_serial: bool,
    pub to_network: bool,
}

impl RelayFlags {
    pub fn new(source: impl Into<String>, to_serial: bool, to_network: bool) -> Self {
        Self {
            source: source.into(),
            to_serial,
            to_network,
        }
    }
}

/// Statistics about the routing table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingStats {
    /// Sources with at least one sink.
    pub routed_sources: usize,
    /// Sources relaying to the serial relay server.
    pub serial_sources: usize,
    /// Sources relaying to the network relay server.
    pub network_sources: usize,
}

/// Mapping `source name -> sink set`.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: AHashMap<String, SinkSet>,
}

impl RoutingTable {
    /// Creates an empty table (nothing is relayed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from relay flags.
    ///
    /// Flags for the same source name are merged. Sources without any sink
    /// are left out of the table.
    pub fn build<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = RelayFlags>,
    {
        let mut routes: AHashMap<String, SinkSet> = AHashMap::new();
        for f in flags {
            if !f.to_serial && !f.to_network {
                continue;
            }
            let set = routes.entry(f.source).or_default();
            if f.to_serial {
                set.insert(SinkKind::SerialRelay);
            }
            if f.to_network {
                set.insert(SinkKind::NetworkRelay);
            }
        }
        Self { routes }
    }

    /// Builds the table from serial source flags and the network client
    /// relay lists of a configuration.
    pub fn from_config(config: &Config) -> Self {
        let serial = config
            .serial
            .iter()
            .map(|s| RelayFlags::new(s.name.clone(), s.relay_to_serial, s.relay_to_network));
        let to_serial = config
            .network
            .clients_to_serial
            .iter()
            .map(|c| RelayFlags::new(c.clone(), true, false));
        let to_network = config
            .network
            .clients_to_server
            .iter()
            .map(|c| RelayFlags::new(c.clone(), false, true));
        Self::build(serial.chain(to_serial).chain(to_network))
    }

    /// Sinks the given source relays to; empty for unknown sources.
    pub fn sinks_for(&self, source: &str) -> SinkSet {
        self.routes.get(source).copied().unwrap_or(SinkSet::NONE)
    }

    /// Returns `true` if `source` relays to `sink`.
    pub fn should_send(&self, source: &str, sink: SinkKind) -> bool {
        self.sinks_for(source).contains(sink)
    }

    pub fn stats(&self) -> RoutingStats {
        RoutingStats {
            routed_sources: self.routes.len(),
            serial_sources: self
                .routes
                .values()
                .filter(|s| s.contains(SinkKind::SerialRelay))
                .count(),
            network_sources: self
                .routes
                .values()
                .filter(|s| s.contains(SinkKind::NetworkRelay))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_only_source() {
        let table = RoutingTable::build([RelayFlags::new("Serial port a", true, false)]);
        assert!(table.should_send("Serial port a", SinkKind::SerialRelay));
        assert!(!table.should_send("Serial port a", SinkKind::NetworkRelay));
    }

    #[test]
    fn test_unknown_source_routes_nowhere() {
        let table = RoutingTable::build([RelayFlags::new("a", true, true)]);
        assert!(table.sinks_for("b").is_empty());
    }

    #[test]
    fn test_flags_for_same_source_merge() {
        let table = RoutingTable::build([
            RelayFlags::new("10.0.0.1:4001", true, false),
            RelayFlags::new("10.0.0.1:4001", false, true),
        ]);
        let sinks: Vec<_> = table.sinks_for("10.0.0.1:4001").iter().collect();
        assert_eq!(sinks, vec![SinkKind::SerialRelay, SinkKind::NetworkRelay]);
    }

    #[test]
    fn test_sources_without_sinks_are_omitted() {
        let table = RoutingTable::build([
            RelayFlags::new("quiet", false, false),
            RelayFlags::new("loud", false, true),
        ]);
        assert_eq!(
            table.stats(),
            RoutingStats {
                routed_sources: 1,
                serial_sources: 0,
                network_sources: 1,
            }
        );
    }
}
