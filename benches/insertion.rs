//! # Insertion and Lookup Benchmarks
//!
//! Measures the cost of building a tree row by row and of point lookups
//! against a populated tree.
//!
//! ## Benchmark Parameters
//!
//! - Ordered insert: keys 1..=N ascending (splits always at the tail)
//! - Reverse insert: keys N..=1 descending (splits always at the head)
//! - Point lookup: every key of a 1,000-row tree, in order
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench --bench insertion
//! cargo bench --bench insertion -- insert   # insertion only
//! cargo bench --bench insertion -- find     # lookups only
//! ```

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tempfile::TempDir;

use rowdb::{Row, Table};

const INSERT_ROWS: u32 = 500;
const LOOKUP_ROWS: u32 = 1_000;

fn row(id: u32) -> Row {
    Row {
        id,
        username: format!("user{id}"),
        email: format!("person{id}@example.com"),
    }
}

fn fresh_table() -> (TempDir, Table) {
    let dir = TempDir::new().expect("failed to create bench directory");
    let table = Table::open(dir.path().join("bench.db")).expect("failed to open bench table");
    (dir, table)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    group.bench_function(BenchmarkId::new("ordered", INSERT_ROWS), |b| {
        b.iter_batched(
            fresh_table,
            |(_dir, mut table)| {
                for id in 1..=INSERT_ROWS {
                    table.insert(black_box(&row(id))).unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function(BenchmarkId::new("reverse", INSERT_ROWS), |b| {
        b.iter_batched(
            fresh_table,
            |(_dir, mut table)| {
                for id in (1..=INSERT_ROWS).rev() {
                    table.insert(black_box(&row(id))).unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let (_dir, mut table) = fresh_table();
    for id in 1..=LOOKUP_ROWS {
        table.insert(&row(id)).unwrap();
    }

    c.bench_function("find/point_lookup", |b| {
        let mut next = 1;
        b.iter(|| {
            let mut cursor = table.find(black_box(next)).unwrap();
            black_box(cursor.row().unwrap());
            next = next % LOOKUP_ROWS + 1;
        });
    });
}

criterion_group!(benches, bench_insert, bench_find);
criterion_main!(benches);
