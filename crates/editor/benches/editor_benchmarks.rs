//! Editor benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use editor::{EditorConfig, EditorSession};
use layers::{LayerId, PanelEdit, TransformEvent};
use serde_json::json;

fn preview_session() -> EditorSession {
    EditorSession::new(EditorConfig::preview()).expect("session")
}

/// Benchmark creating and mounting layers.
fn bench_mount(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("mount");

    for count in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::new("rect_layers", count), &count, |b, &count| {
            let _guard = runtime.enter();
            b.iter(|| {
                let mut session = preview_session();
                for i in 0..count {
                    session.create_layer("rect", &json!({"x": i as f32}));
                }
                black_box(session.flush().mounted)
            })
        });
    }

    group.finish();
}

/// Benchmark many mutations coalescing into one flush.
fn bench_coalesced_updates(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let _guard = runtime.enter();
    let mut group = c.benchmark_group("updates");

    let mut session = EditorSession::new(EditorConfig::default()).expect("session");
    let ids: Vec<LayerId> = (0..50)
        .filter_map(|_| session.create_layer("rect", &json!({})))
        .collect();
    session.flush();

    group.bench_function("drag_frames", |b| {
        let layer = session.store().layer(&ids[0]).expect("layer");
        b.iter(|| {
            for step in 0..30 {
                let event = TransformEvent::moved_to(step as f32, step as f32, &layer);
                let _ = session.transform(&ids[0], &event);
            }
            black_box(session.flush().updated)
        })
    });

    group.bench_function("panel_edits", |b| {
        session.select(&ids[..1]);
        b.iter(|| {
            for width in 10..40 {
                let _ = session.edit(PanelEdit::input("width", json!(width)));
            }
            black_box(session.flush().updated)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_mount, bench_coalesced_updates);
criterion_main!(benches);
