//! Policy decision benchmarks
//!
//! The decision runs on every intercepted call, so the non-target path
//! has to stay cheap.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use file_redirect::policy::{FileOperation, RedirectPolicy, TargetFileSet};
use file_redirect::substitute::NullDeviceProvider;
use std::path::Path;

fn bench_decide(c: &mut Criterion) {
    let policy = RedirectPolicy::builtin();

    c.bench_function("decide non-target", |b| {
        b.iter(|| policy.decide(black_box(FileOperation::Exists), black_box("libc.so.6")));
    });

    c.bench_function("decide target exists", |b| {
        b.iter(|| policy.decide(black_box(FileOperation::Exists), black_box("mrpcs-android-l.gr_925.data")));
    });

    c.bench_function("decide_path non-target", |b| {
        let path = Path::new("/usr/share/locale/en_US/LC_MESSAGES/libc.mo");
        b.iter(|| policy.decide_path(black_box(FileOperation::Length), black_box(path)));
    });
}

fn bench_open_for_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("open_for_read");

    let temp_policy = RedirectPolicy::builtin();
    group.bench_function("temp file", |b| {
        b.iter(|| temp_policy.decide(FileOperation::OpenForRead, black_box("cache.gr_925.data")));
    });

    let null_policy = RedirectPolicy::new(TargetFileSet::builtin(), NullDeviceProvider);
    group.bench_function("null device", |b| {
        b.iter(|| null_policy.decide(FileOperation::OpenForRead, black_box("cache.gr_925.data")));
    });

    group.finish();
}

criterion_group!(benches, bench_decide, bench_open_for_read);
criterion_main!(benches);
