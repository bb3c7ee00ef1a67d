//! Write-path benchmarks: counting commits and counters.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use noderepo_bench::{generate_nodes, populated_client, random_data};
use noderepo_core::{ApplicationId, NestedTransaction, NodeState};
use noderepo_store::{Counter, InMemoryStore, Path};
use std::sync::Arc;

/// Benchmark committing one counting transaction that writes a payload.
fn bench_counting_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("counting_commit");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let client = populated_client(0, true);
            let app = ApplicationId::new("tenant:app:default");
            let data = random_data(size);

            b.iter(|| {
                let mut nested = NestedTransaction::new();
                client
                    .write_application(&app, black_box(data.clone()), &mut nested)
                    .unwrap();
                nested.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark moving batches of nodes between two states.
fn bench_move_nodes(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_nodes");

    for batch_size in [10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let client = populated_client(0, true);
                let mut nodes = client
                    .add_nodes_in_state(&generate_nodes(batch_size, 256), NodeState::Ready)
                    .unwrap();
                let mut target = NodeState::Dirty;

                b.iter(|| {
                    nodes = client.write_to_now(target, black_box(&nodes)).unwrap();
                    target = if target == NodeState::Dirty {
                        NodeState::Ready
                    } else {
                        NodeState::Dirty
                    };
                });
            },
        );
    }
    group.finish();
}

/// Benchmark the compare-and-set counter.
fn bench_counter_next(c: &mut Criterion) {
    c.bench_function("counter_next", |b| {
        let counter = Counter::new(Arc::new(InMemoryStore::new()), Path::from_string("/counter"));
        b.iter(|| black_box(counter.next().unwrap()));
    });
}

criterion_group!(benches, bench_counting_commit, bench_move_nodes, bench_counter_next);
criterion_main!(benches);
