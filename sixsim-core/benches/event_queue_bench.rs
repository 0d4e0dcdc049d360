#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use sixsim_core::events::{EventQueue, Tag};

fn bench_event_queue_schedule_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_queue_throughput");

    for pending in [128u64, 1024, 16384] {
        group.throughput(criterion::Throughput::Elements(pending));
        group.bench_function(format!("pending_{}", pending), |b| {
            b.iter(|| {
                let mut queue = EventQueue::new();
                for i in 0..pending {
                    let tag = Tag::node((i % 64) as u32, "tx");
                    queue.remove_tagged(&tag, None);
                    queue.insert(i % 101, (i % 3) as i32, Some(tag), i);
                }
                while let Some(time) = queue.next_time() {
                    while let Some(event) = queue.pop_due(time) {
                        black_box(event);
                    }
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_event_queue_schedule_dispatch);
criterion_main!(benches);
