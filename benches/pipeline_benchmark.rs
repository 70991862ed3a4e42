//! Performance benchmarks for the ingestion pipeline
//!
//! Run with: cargo bench --features benchmarks

#[cfg(feature = "benchmarks")]
use aislogger::decode::{AisDecoder, Decoder};
#[cfg(feature = "benchmarks")]
use aislogger::hub::{Hub, HubSinks, PositionSource};
#[cfg(feature = "benchmarks")]
use aislogger::reassembly::Reassembler;
#[cfg(feature = "benchmarks")]
use aislogger::router::{create_queue, RawRecord, SourceId};
#[cfg(feature = "benchmarks")]
use aislogger::routing::{RelayFlags, RoutingTable};
#[cfg(feature = "benchmarks")]
use aislogger::stats::StatsTable;
#[cfg(feature = "benchmarks")]
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
#[cfg(feature = "benchmarks")]
use std::sync::Arc;

#[cfg(feature = "benchmarks")]
const TYPE1: &str = "!AIVDM,1,1,,A,15RTgt0PAso;90TKcjM8h6g208CQ,0*4A";

#[cfg(feature = "benchmarks")]
fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("position_report", |b| {
        b.iter(|| AisDecoder.decode(black_box(TYPE1)))
    });

    group.finish();
}

#[cfg(feature = "benchmarks")]
fn benchmark_reassembly(c: &mut Criterion) {
    let source = SourceId::new("bench");
    let fragments: Vec<String> = (1..=3)
        .map(|n| format!("!AIVDM,3,{},7,A,000000000000,0", n))
        .collect();

    c.bench_function("reassemble_three_fragments", |b| {
        let mut reassembler = Reassembler::new();
        b.iter(|| {
            for fragment in &fragments {
                black_box(reassembler.push(&source, fragment));
            }
        })
    });
}

#[cfg(feature = "benchmarks")]
fn benchmark_hub(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub");
    group.throughput(Throughput::Elements(1));

    let sinks = HubSinks {
        registry: create_queue(1000),
        raw_archive: create_queue(1000),
        serial_relay: Some(create_queue(1000)),
        network_relay: Some(create_queue(1000)),
    };
    let routing = RoutingTable::build([RelayFlags::new("bench", true, true)]);
    let mut hub = Hub::new(
        Arc::new(AisDecoder),
        Arc::new(routing),
        Arc::new(StatsTable::new()),
        PositionSource::Any,
        sinks,
    );
    let source = SourceId::new("bench");

    group.bench_function("process_relayed_line", |b| {
        b.iter(|| hub.process(RawRecord::new(source.clone(), TYPE1.as_bytes().to_vec())))
    });

    group.finish();
}

#[cfg(feature = "benchmarks")]
criterion_group!(benches, benchmark_decode, benchmark_reassembly, benchmark_hub);

#[cfg(feature = "benchmarks")]
criterion_main!(benches);

#[cfg(not(feature = "benchmarks"))]
fn main() {
    println!("Benchmarks are disabled. Enable with:");
    println!("  cargo bench --features benchmarks");
}
