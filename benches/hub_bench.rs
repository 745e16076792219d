//! Benchmarks for hub fan-out
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use dicerelay::websocket::{
    Connection, ConnectionHub, DiceRoll, EnvelopeRelay, HubConfig, InboundMessage,
    OutboundReceiver,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const MESSAGES: usize = 100;

async fn connect_all(hub: &ConnectionHub, count: usize) -> Vec<OutboundReceiver> {
    let mut receivers = Vec::with_capacity(count);
    for _ in 0..count {
        let (conn, rx) = Connection::new(None, MESSAGES * 2 + count);
        hub.register(conn).await.unwrap();
        receivers.push(rx);
    }
    receivers
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("fan_out");

    for clients in [10, 100, 1000] {
        group.throughput(Throughput::Elements((clients * MESSAGES) as u64));

        group.bench_function(format!("relay_{}_clients", clients), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let hub = ConnectionHub::spawn(
                        HubConfig {
                            max_connections: clients,
                        },
                        Arc::new(EnvelopeRelay::new("10.0.0.1")),
                    );
                    let receivers = connect_all(&hub, clients).await;

                    for i in 0..MESSAGES {
                        hub.broadcast(InboundMessage {
                            sender: "bench".to_string(),
                            content: format!("message {}", i),
                            sender_addr: None,
                        })
                        .unwrap();
                    }

                    let stats = hub.stats().await.unwrap();
                    hub.shutdown().await;
                    black_box((stats, receivers))
                })
            })
        });
    }

    group.finish();
}

fn bench_dice_roll(c: &mut Criterion) {
    let dice = DiceRoll::default();
    let mut rng = StdRng::seed_from_u64(0);

    c.bench_function("dice_roll_describe", |b| {
        b.iter(|| dice.roll(&mut rng).describe(black_box("roll")))
    });
}

criterion_group!(benches, bench_fan_out, bench_dice_roll);
criterion_main!(benches);
