use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use tokio::sync::mpsc;

use visage::signaling::{ClientEvent, ConnectionId, SignalingCoordinator};

/// envelope parsing benchmark
fn bench_parsing(c: &mut Criterion) {
    let frame_text = serde_json::to_string(&json!({
        "event": "video:frame",
        "data": {"frameData": "QUFBQQ==".repeat(128)}
    }))
    .unwrap();

    let mut group = c.benchmark_group("Parsing");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ClientEvent", |b| {
        b.iter(|| {
            let event: ClientEvent = serde_json::from_str(black_box(&frame_text)).unwrap();
            black_box(event)
        })
    });

    group.finish();
}

/// frame fan-out benchmark: one sender, the rest of the room receiving
fn bench_frame_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fanout");

    for members in [2usize, 8, 32] {
        let mut coordinator = SignalingCoordinator::new();
        let mut receivers = Vec::new();

        for i in 0..members {
            let conn = ConnectionId::from(format!("conn_{:08x}", i).as_str());
            let (tx, rx) = mpsc::unbounded_channel();
            coordinator.attach(conn, tx);
            coordinator.join(
                conn,
                json!({
                    "externalId": format!("user-{}", i),
                    "displayName": format!("User {}", i),
                    "roomId": "bench"
                }),
            );
            receivers.push(rx);
        }
        for rx in &mut receivers {
            while rx.try_recv().is_ok() {}
        }

        let sender = ConnectionId::from("conn_00000000");
        let frame = json!({"frameData": "QUFBQQ==".repeat(128)});

        group.throughput(Throughput::Elements(members as u64 - 1));
        group.bench_function(format!("{}_members", members), |b| {
            b.iter(|| {
                coordinator.relay_frame(sender, black_box(frame.clone()));
                for rx in &mut receivers {
                    while rx.try_recv().is_ok() {}
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_frame_fanout);
criterion_main!(benches);
