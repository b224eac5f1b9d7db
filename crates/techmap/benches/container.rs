mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use techmap::prelude::{Container, LATITUDE};

fn window_read_benches(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("excl.tmap");
    let size = 1024;
    common::write_exclusions(&path, size);
    let container = Container::open(&path).expect("open");

    let mut group = c.benchmark_group("container/read_window");
    for &edge in &[64usize, 128, 300, 1024] {
        group.throughput(common::elements_throughput(edge * edge));
        // Offset so that windows straddle chunk boundaries.
        let start = (size - edge) / 2;
        group.bench_with_input(BenchmarkId::from_parameter(edge), &edge, |b, &edge| {
            b.iter(|| {
                let values = container
                    .read_window_f64(LATITUDE, start..start + edge, start..start + edge)
                    .expect("read window");
                black_box(values.len());
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = window_read_benches
}
criterion_main!(benches);
