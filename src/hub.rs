//! Reassembly and distribution hub.
//!
//! Consumes the shared inbound queue. For each raw record the hub counts
//! it, relays its bytes to the sinks the routing table names for its source,
//! archives it for the raw view, and then reassembles and decodes it. Vessel
//! reports go to the registry; own-position fixes only when their source
//! passes arbitration. Decode failures are dropped silently and show up
//! only as the gap between the `received` and `parsed` counters.

use crate::decode::{Decoder, ParsedMessage};
use crate::error::Result;
use crate::reassembly::{Assembled, Reassembler};
use crate::registry::{RegistryCommand, RegistryQueue};
use crate::router::{RawQueue, RawRecord, RelayQueue};
use crate::routing::{RoutingTable, SinkKind};
use crate::stats::StatsTable;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

/// Which source own-position fixes are accepted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionSource {
    Any,
    Named(String),
}

impl PositionSource {
    /// `any` (case-insensitive) or an exact source name.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("any") {
            PositionSource::Any
        } else {
            PositionSource::Named(value.trim().to_string())
        }
    }

    pub fn accepts(&self, source: &str) -> bool {
        match self {
            PositionSource::Any => true,
            PositionSource::Named(name) => name == source,
        }
    }
}

/// Outbound queues of the hub.
#[derive(Clone)]
pub struct HubSinks {
    pub registry: RegistryQueue,
    /// Raw archive read by the raw view.
    pub raw_archive: RawQueue,
    pub serial_relay: Option<RelayQueue>,
    pub network_relay: Option<RelayQueue>,
}

pub struct Hub {
    decoder: Arc<dyn Decoder>,
    routing: Arc<RoutingTable>,
    stats: Arc<StatsTable>,
    position_source: PositionSource,
    sinks: HubSinks,
    reassembler: Reassembler,
}

impl Hub {
    pub fn new(
        decoder: Arc<dyn Decoder>,
        routing: Arc<RoutingTable>,
        stats: Arc<StatsTable>,
        position_source: PositionSource,
        sinks: HubSinks,
    ) -> Self {
        Self {
            decoder,
            routing,
            stats,
            position_source,
            sinks,
            reassembler: Reassembler::new(),
        }
    }

    /// Processes one raw record.
    pub fn process(&mut self, record: RawRecord) {
        let source = record.source.as_str();
        self.stats.record_received(source);

        for sink in self.routing.sinks_for(source).iter() {
            let queue = match sink {
                SinkKind::SerialRelay => self.sinks.serial_relay.as_ref(),
                SinkKind::NetworkRelay => self.sinks.network_relay.as_ref(),
            };
            if let Some(queue) = queue {
                queue.push(record.payload.clone());
            }
        }

        let line = record.line().into_owned();
        let complete = match self.reassembler.push(&record.source, &line) {
            Assembled::Complete(line) => Some(line),
            Assembled::Fragments(lines) => match self.decoder.join_fragments(&lines) {
                Ok(joined) => Some(joined),
                Err(e) => {
                    trace!("{}: joining {} fragments failed: {}", source, lines.len(), e);
                    None
                }
            },
            Assembled::Pending | Assembled::Discarded => None,
        };

        if let Some(line) = complete {
            self.decode(source, &line);
        }
        self.sinks.raw_archive.push(record);
    }

    fn decode(&self, source: &str, line: &str) {
        match self.decoder.decode(line) {
            Ok(ParsedMessage::Vessel(report)) => {
                if report.mmsi <= 1 {
                    return;
                }
                if report.decoded {
                    self.stats.record_parsed(source);
                }
                self.sinks.registry.push(RegistryCommand::Vessel(report));
            }
            Ok(ParsedMessage::OwnPosition(fix)) => {
                if !self.position_source.accepts(source) {
                    trace!("{}: own position ignored, not the position source", source);
                    return;
                }
                self.stats.record_parsed(source);
                self.sinks.registry.push(RegistryCommand::OwnPosition {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    sog: fix.sog,
                    cog: fix.cog,
                    source: source.to_string(),
                });
            }
            Err(e) => trace!("{}: {}", source, e),
        }
    }

    /// Processes one record; a panic drops only that record.
    pub fn process_isolated(&mut self, record: RawRecord) {
        let source = record.source.clone();
        if panic::catch_unwind(AssertUnwindSafe(|| self.process(record))).is_err() {
            error!("Hub dropped a record from {} after a panic", source);
        }
    }

    /// Consumes `inbound` until cancelled.
    pub async fn run(mut self, inbound: RawQueue, token: CancellationToken) -> Result<()> {
        info!("Hub started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                record = inbound.pop() => self.process_isolated(record),
            }
        }
        info!("Hub stopped");
        Ok(())
    }
}
