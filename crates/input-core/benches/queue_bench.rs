//! Criterion benchmarks for the event queue and the push pipeline.
//!
//! Run with:
//! ```bash
//! cargo bench --package input-core --bench queue_bench
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use input_core::events::{EventQueue, WindowEventKind};
use input_core::{EventKind, EventSystem, InputEvent, WindowId};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn mixed_events(count: usize) -> Vec<InputEvent> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                InputEvent::user(i as i32, 0, 0)
            } else {
                InputEvent::window(WindowId(1), WindowEventKind::Exposed)
            }
        })
        .collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_queue_push_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_get");
    for size in [16usize, 256, 4096] {
        let events = mixed_events(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                let mut queue = EventQueue::with_capacity(size);
                for event in events {
                    queue.push_back(event.clone());
                }
                black_box(queue.get(usize::MAX, EventKind::User.only()))
            });
        });
    }
    group.finish();
}

fn bench_system_push_with_watcher(c: &mut Criterion) {
    let system = EventSystem::new(65535);
    system.start().expect("start");
    system
        .add_watcher(Arc::new(|_: &EventSystem, event: &InputEvent| {
            black_box(event.kind());
        }))
        .expect("watcher");

    c.bench_function("system_push_poll", |b| {
        b.iter(|| {
            system.push(InputEvent::user(1, 2, 3)).expect("push");
            black_box(system.poll().expect("poll"))
        });
    });
}

criterion_group!(benches, bench_queue_push_get, bench_system_push_with_watcher);
criterion_main!(benches);
