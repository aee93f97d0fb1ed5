//! Benchmarks for the per-event work of the enter handler.
//!
//! - Class name resolution (plain, generic, module-qualified)
//! - Method name resolution
//! - Argument descriptor acquisition with and without the resize round trip

extern crate eltscope;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{ScriptedRuntime, FIB, LIST_OF_STRING, PROGRAM, SUM};
use criterion::{criterion_group, criterion_main, Criterion};
use eltscope::{
    arguments::{acquire_arguments, ArgumentDescriptor},
    diagnostics::Diagnostics,
    resolver::{NameResolver, NameStyle, ResolverLimits},
    runtime::{EltInfo, FrameInfo},
};
use std::hint::black_box;

fn bench_class_names(c: &mut Criterion) {
    let runtime = ScriptedRuntime::new();
    let resolver = NameResolver::new(runtime.as_ref(), ResolverLimits::default());

    c.bench_function("class_name_plain", |b| {
        b.iter(|| black_box(resolver.class_name(black_box(PROGRAM), NameStyle::Simple)));
    });

    c.bench_function("class_name_generic", |b| {
        b.iter(|| black_box(resolver.class_name(black_box(LIST_OF_STRING), NameStyle::Simple)));
    });

    c.bench_function("class_name_qualified", |b| {
        b.iter(|| {
            black_box(resolver.class_name(black_box(LIST_OF_STRING), NameStyle::Qualified))
        });
    });
}

fn bench_method_name(c: &mut Criterion) {
    let runtime = ScriptedRuntime::new();
    let resolver = NameResolver::new(runtime.as_ref(), ResolverLimits::default());

    c.bench_function("method_name", |b| {
        b.iter(|| black_box(resolver.method_name(black_box(FIB), FrameInfo::NULL)));
    });
}

fn bench_arguments(c: &mut Criterion) {
    let runtime = ScriptedRuntime::new();
    let diagnostics = Diagnostics::new();

    // One range fits the trial buffer, three ranges force the retry.
    c.bench_function("arguments_single_call", |b| {
        b.iter(|| {
            black_box(acquire_arguments(
                runtime.as_ref(),
                black_box(FIB),
                EltInfo(1),
                ArgumentDescriptor::size_for(1),
                &diagnostics,
            ))
        });
    });

    c.bench_function("arguments_resized", |b| {
        b.iter(|| {
            black_box(acquire_arguments(
                runtime.as_ref(),
                black_box(SUM),
                EltInfo(1),
                ArgumentDescriptor::size_for(1),
                &diagnostics,
            ))
        });
    });
}

criterion_group!(benches, bench_class_names, bench_method_name, bench_arguments);
criterion_main!(benches);
