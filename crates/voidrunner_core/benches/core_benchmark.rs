//! # Simulation and Wire-Format Benchmark
//!
//! A room tick and a snapshot diff must both stay well under the 16.6ms
//! tick budget even with a room near capacity.
//!
//! Run with: `cargo bench --package voidrunner_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use voidrunner_core::config::GameplayConfig;
use voidrunner_core::protocol::{decode, encode, Packet, PacketHeader, PacketType};
use voidrunner_core::simulation::RoomWorld;
use voidrunner_core::snapshot::SnapshotCache;

const ROOM_CAPACITY: u8 = 8;
const TICK_DT: f32 = 1.0 / 60.0;

fn populated_room(players: u8) -> (RoomWorld, GameplayConfig) {
    let cfg = GameplayConfig::default();
    let mut world = RoomWorld::new(1);
    for player_id in 1..=players {
        world.spawn_player(u32::from(player_id), player_id % 5, &cfg);
    }
    (world, cfg)
}

/// Benchmark: one tick of a full 8-player room.
fn bench_room_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("room_tick");
    for &players in &[1u8, 4, ROOM_CAPACITY] {
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &players| {
            let (mut world, cfg) = populated_room(players);
            b.iter(|| {
                world.tick(black_box(TICK_DT), &cfg, true);
            });
        });
    }
    group.finish();
}

/// Benchmark: building a snapshot delta for a full room, steady state.
fn bench_snapshot_build(c: &mut Criterion) {
    let (mut world, cfg) = populated_room(ROOM_CAPACITY);
    let mut cache = SnapshotCache::new();
    cache.build_update(world.live_entities(), vec![], true);

    c.bench_function("snapshot_build_steady_state", |b| {
        b.iter(|| {
            world.tick(TICK_DT, &cfg, true);
            black_box(cache.build_update(world.live_entities(), vec![], false));
        });
    });
}

/// Benchmark: encode/decode round trip for a `CLIENT_INPUT` packet, the
/// highest-frequency inbound packet on the wire.
fn bench_client_input_round_trip(c: &mut Criterion) {
    use voidrunner_core::protocol::ClientInputPayload;

    let header = PacketHeader::new(PacketType::ClientInput, 1, 0);
    let input_mask = ClientInputPayload::RIGHT | ClientInputPayload::FIRE;
    let payload = ClientInputPayload { player_id: 1, input_mask, charge_level: 0, input_seq: 42 };
    let packet = Packet::ClientInput(header, payload);

    c.bench_function("client_input_encode", |b| {
        b.iter(|| black_box(encode(black_box(&packet))));
    });

    let bytes = encode(&packet);
    c.bench_function("client_input_decode", |b| {
        b.iter(|| black_box(decode(black_box(&bytes))));
    });
}

criterion_group!(benches, bench_room_tick, bench_snapshot_build, bench_client_input_round_trip);
criterion_main!(benches);
