//! Benchmarks for field building and trail drawing.
//!
//! Run with: cargo bench --package renderer --bench field_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flow_common::{CanvasBound, Extent, VectorKeys};
use renderer::{build_field, Color, Segment, Surface};
use test_utils::global_coverage;

fn bench_build_field(c: &mut Criterion) {
    let data = global_coverage(1.0, |lon, lat| {
        let u = (lon.to_radians() * 3.0).sin() * 10.0;
        let v = (lat.to_radians() * 2.0).cos() * 5.0;
        Some((u as f32, v as f32))
    });
    let keys = VectorKeys::default();

    let mut group = c.benchmark_group("build_field");
    for (width, height) in [(256u32, 256u32), (800, 600), (1920, 1080)] {
        let extent = Extent::from_degrees([-30.0, 20.0], [40.0, 65.0], width, height);
        let bound = CanvasBound::build([0.0, 0.0], [width as f64, height as f64], width, height);
        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &(extent, bound),
            |b, (extent, bound)| {
                b.iter(|| build_field(black_box(&data), &keys, 0.015, bound, extent))
            },
        );
    }
    group.finish();
}

fn bench_draw_frame(c: &mut Criterion) {
    let (width, height) = (800u32, 600u32);
    let bound = CanvasBound::build([0.0, 0.0], [width as f64, height as f64], width, height);
    // Default density: one particle per 200 pixels.
    let segments: Vec<Segment> = (0..(width * height / 200))
        .map(|i| {
            let x = (i * 37 % width) as f32;
            let y = (i * 91 % height) as f32;
            Segment {
                from: [x, y],
                to: [x + 1.5, y - 0.5],
            }
        })
        .collect();

    c.bench_function("draw_frame_800x600", |b| {
        let mut surface = Surface::new(width, height).expect("surface");
        b.iter(|| {
            surface.fade(&bound, 0.9);
            for chunk in segments.chunks(segments.len() / 15 + 1) {
                surface.stroke_segments(Color::rgb(250, 112, 52), 1.0, 0.9, chunk.iter().copied());
            }
        })
    });
}

criterion_group!(benches, bench_build_field, bench_draw_frame);
criterion_main!(benches);
