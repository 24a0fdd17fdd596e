use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::prelude::*;

use astrofocus::{BitDepth, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_STARS, Image, ImageMeta, find_stars};
use common::buffer2::Buffer2;

/// Flat sky with `count` Gaussian stars on a jittered grid and Gaussian read noise.
fn star_field(width: usize, height: usize, count: usize, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = Buffer2::new_filled(width, height, 1000.0f32);

    let columns = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(columns);
    for i in 0..count {
        let cx = (i % columns) as f32 + 0.5 + rng.random_range(-0.2..0.2);
        let cy = (i / columns) as f32 + 0.5 + rng.random_range(-0.2..0.2);
        let x = cx * width as f32 / columns as f32;
        let y = cy * height as f32 / rows as f32;
        let amplitude = rng.random_range(100.0..20_000.0f32);
        let sigma = rng.random_range(1.2..2.5f32);

        let reach = (5.0 * sigma).ceil() as i64;
        for py in (y as i64 - reach)..=(y as i64 + reach) {
            for px in (x as i64 - reach)..=(x as i64 + reach) {
                if !pixels.contains(px, py) {
                    continue;
                }
                let d2 = (px as f32 - x).powi(2) + (py as f32 - y).powi(2);
                pixels[(px as usize, py as usize)] += amplitude * (-d2 / (2.0 * sigma * sigma)).exp();
            }
        }
    }

    for v in pixels.pixels_mut() {
        let u1: f32 = rng.random::<f32>().max(f32::MIN_POSITIVE);
        let u2: f32 = rng.random();
        let noise = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
        *v = (*v + 12.0 * noise).round().clamp(0.0, u16::MAX as f32);
    }

    Image::new(pixels, BitDepth::Int16, 0.0, ImageMeta::default())
        .expect("benchmark field fits in 16 bits")
}

fn bench_find_stars(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_stars");
    group.sample_size(20);

    for (width, height, count) in [(640, 480, 50), (1280, 960, 200), (3008, 3008, 1000)] {
        let image = star_field(width, height, count, 42);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}_{count}")),
            &image,
            |b, image| {
                b.iter(|| {
                    black_box(find_stars(
                        black_box(image),
                        10.0,
                        DEFAULT_MAX_STARS,
                        DEFAULT_MAX_ITERATIONS,
                    ))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_find_stars);
criterion_main!(benches);
