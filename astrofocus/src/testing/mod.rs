//! Testing utilities for astrofocus.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::buffer2::Buffer2;
use rand::prelude::*;

use crate::image::{BitDepth, Image, ImageMeta, RowOrder, SensorType};

const TEST_DATA_ENV: &str = "ASTROFOCUS_TEST_DATA_DIR";

/// Path of a named real frame.
///
/// Real-frame tests only run with the `real-data` feature, so a missing
/// directory or frame fails the test instead of passing it silently.
pub fn real_frame(name: &str) -> PathBuf {
    real_frame_in(std::env::var_os(TEST_DATA_ENV).map(PathBuf::from), name)
}

pub(crate) fn real_frame_in(dir: Option<PathBuf>, name: &str) -> PathBuf {
    let Some(dir) = dir else {
        panic!("{TEST_DATA_ENV} must point at the real frames when the real-data feature is on");
    };
    let path = dir.join(name);
    assert!(path.is_file(), "real frame {} not found", path.display());
    path
}

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Metadata resembling a small guide camera on a 190 mm refractor.
pub fn sample_meta() -> ImageMeta {
    ImageMeta {
        instrument: "Synthetic Cam".to_string(),
        telescope: String::new(),
        exposure_start: Utc
            .with_ymd_and_hms(2024, 3, 14, 21, 5, 30)
            .single()
            .expect("valid timestamp")
            + chrono::Duration::nanoseconds(123_456_789),
        exposure_duration: Duration::from_millis(2500),
        filter: "L".to_string(),
        pixel_size_x: 2.4,
        pixel_size_y: 2.4,
        focal_length: 190.0,
        focus_position: -1,
        bin_x: 1,
        bin_y: 1,
        ccd_temperature: f32::NAN,
        sensor_type: SensorType::Monochrome,
        bayer_offset_x: 0,
        bayer_offset_y: 0,
        row_order: RowOrder::TopDown,
    }
}

/// Circular Gaussian star centred on pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticStar {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
    pub amplitude: f32,
}

impl SyntheticStar {
    pub fn new(x: f32, y: f32, sigma: f32, amplitude: f32) -> Self {
        Self {
            x,
            y,
            sigma,
            amplitude,
        }
    }
}

/// Flat background plus Gaussian stars and seeded Gaussian read noise,
/// quantised to 16-bit counts.
#[derive(Debug, Clone)]
pub struct StarField {
    pub width: usize,
    pub height: usize,
    pub background: f32,
    pub noise: f32,
    pub stars: Vec<SyntheticStar>,
    pub seed: u64,
}

impl StarField {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            background: 1000.0,
            noise: 10.0,
            stars: Vec::new(),
            seed: 12345,
        }
    }

    pub fn with_background(mut self, background: f32, noise: f32) -> Self {
        self.background = background;
        self.noise = noise;
        self
    }

    pub fn with_star(mut self, star: SyntheticStar) -> Self {
        self.stars.push(star);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn render(&self) -> Buffer2<f32> {
        let mut pixels = Buffer2::new_filled(self.width, self.height, self.background);

        for star in &self.stars {
            render_gaussian_star(&mut pixels, star);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        for v in pixels.pixels_mut() {
            let noisy = *v + self.noise * gaussian(&mut rng);
            *v = noisy.round().clamp(0.0, u16::MAX as f32);
        }
        pixels
    }

    pub fn image(&self) -> Image {
        Image::new(self.render(), BitDepth::Int16, 0.0, sample_meta())
            .expect("synthetic field is valid 16-bit data")
    }
}

/// Adds a Gaussian profile evaluated at pixel centres, out to 5 sigma.
pub fn render_gaussian_star(pixels: &mut Buffer2<f32>, star: &SyntheticStar) {
    let reach = (5.0 * star.sigma).ceil() as i64;
    let cx = star.x.round() as i64;
    let cy = star.y.round() as i64;
    let two_sigma_sq = 2.0 * star.sigma * star.sigma;

    for y in (cy - reach)..=(cy + reach) {
        for x in (cx - reach)..=(cx + reach) {
            if !pixels.contains(x, y) {
                continue;
            }
            let dx = x as f32 - star.x;
            let dy = y as f32 - star.y;
            let value = star.amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
            pixels[(x as usize, y as usize)] += value;
        }
    }
}

/// Standard normal sample (Box-Muller).
pub fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

/// Twelve well separated stars on a 256x256 field: three at each of four brightness
/// levels. With the default 10 ADU noise the levels sit near SNR 80, 40, 15 and 6.
pub fn four_level_field() -> StarField {
    let amplitudes = [800.0, 400.0, 150.0, 60.0];
    let mut field = StarField::new(256, 256);
    for (level, &amplitude) in amplitudes.iter().enumerate() {
        for column in 0..3 {
            let x = 40.0 + 80.0 * column as f32;
            let y = 32.0 + 60.0 * level as f32;
            field = field.with_star(SyntheticStar::new(x, y, 2.0, amplitude));
        }
    }
    field
}
