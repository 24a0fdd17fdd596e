//! Centroid, flux, HFD and FWHM of a single candidate.
//!
//! Pixel `(x, y)` is treated as a sample at its centre, coordinate `(x, y)`.

use common::buffer2::Buffer2;
use glam::DVec2;

use crate::math::Accumulator;

use super::background::Background;
use super::config::StarDetectionConfig;
use super::labeling::Candidate;
use super::star::Star;

/// Centroid shifts below this many pixels end the refinement.
const CENTROID_CONVERGENCE: f64 = 1e-3;

/// Sub-pixel offsets used for half-flux sampling (3x3 per pixel).
const SUBPIXEL_OFFSETS: [f64; 3] = [-1.0 / 3.0, 0.0, 1.0 / 3.0];

/// Aperture radius derived from the candidate's area, clamped to the configured range.
fn aperture_radius(area: usize, config: &StarDetectionConfig) -> f64 {
    let equivalent_radius = (area as f64 / std::f64::consts::PI).sqrt();
    let radius = (2.0 * equivalent_radius).ceil() as usize + 2;
    radius.clamp(config.min_aperture_radius, config.max_aperture_radius) as f64
}

/// Pixel window covering a circle, clipped to the frame.
fn window(
    pixels: &Buffer2<f32>,
    center: DVec2,
    radius: f64,
) -> (std::ops::RangeInclusive<usize>, std::ops::RangeInclusive<usize>) {
    let max_x = pixels.width() as f64 - 1.0;
    let max_y = pixels.height() as f64 - 1.0;
    let x0 = (center.x - radius).floor().clamp(0.0, max_x) as usize;
    let x1 = (center.x + radius).ceil().clamp(0.0, max_x) as usize;
    let y0 = (center.y - radius).floor().clamp(0.0, max_y) as usize;
    let y1 = (center.y + radius).ceil().clamp(0.0, max_y) as usize;
    (x0..=x1, y0..=y1)
}

/// Measure one candidate. Never fails: unmeasurable metrics are NaN.
pub(crate) fn measure_star(
    pixels: &Buffer2<f32>,
    candidate: &Candidate,
    background: &Background,
    config: &StarDetectionConfig,
) -> Star {
    let radius = aperture_radius(candidate.area, config);
    let peak = DVec2::new(candidate.peak_x as f64, candidate.peak_y as f64);
    let pos = refine_centroid(pixels, peak, radius, background.level, config);
    let flux = aperture_flux(pixels, pos, radius, background.level);

    let inside = pos.x - radius >= 0.0
        && pos.y - radius >= 0.0
        && pos.x + radius <= pixels.width() as f64 - 1.0
        && pos.y + radius <= pixels.height() as f64 - 1.0;

    let measurable = candidate.saturated == 0
        && candidate.area >= config.min_measurable_area
        && inside
        && flux > 0.0;

    let (hfd, fwhm) = if measurable {
        let amplitude = (candidate.peak_value - background.level) as f64;
        (
            half_flux_diameter(pixels, pos, radius, background.level),
            full_width_half_max(pixels, pos, radius, background.level, amplitude),
        )
    } else {
        (f32::NAN, f32::NAN)
    };

    Star {
        pos,
        snr: background.snr(candidate.peak_value),
        hfd,
        fwhm,
        flux: flux as f32,
        peak: candidate.peak_value,
    }
}

/// Iterative intensity-weighted centroid in a circular aperture.
///
/// Starts at the peak pixel and re-centres the aperture on each new estimate.
fn refine_centroid(
    pixels: &Buffer2<f32>,
    start: DVec2,
    radius: f64,
    background: f32,
    config: &StarDetectionConfig,
) -> DVec2 {
    let radius_sq = radius * radius;
    let mut center = start;

    for _ in 0..config.max_centroid_iterations {
        let (xs, ys) = window(pixels, center, radius);
        let mut sum = DVec2::ZERO;
        let mut weight = 0.0f64;

        for y in ys {
            for x in xs.clone() {
                let p = DVec2::new(x as f64, y as f64);
                if p.distance_squared(center) > radius_sq {
                    continue;
                }
                let v = pixels[(x, y)];
                if !v.is_finite() {
                    continue;
                }
                let w = (v - background).max(0.0) as f64;
                sum += p * w;
                weight += w;
            }
        }

        if weight <= 0.0 {
            break;
        }

        let next = sum / weight;
        let shift = next.distance(center);
        center = next;
        if shift < CENTROID_CONVERGENCE {
            break;
        }
    }

    center
}

/// Background-subtracted flux of the in-frame pixels within the aperture.
fn aperture_flux(pixels: &Buffer2<f32>, center: DVec2, radius: f64, background: f32) -> f64 {
    let radius_sq = radius * radius;
    let (xs, ys) = window(pixels, center, radius);
    let mut flux = 0.0;

    for y in ys {
        for x in xs.clone() {
            let v = pixels[(x, y)];
            if v.is_finite() && DVec2::new(x as f64, y as f64).distance_squared(center) <= radius_sq
            {
                flux += (v - background) as f64;
            }
        }
    }

    flux
}

/// Diameter of the circle holding half of the aperture flux.
///
/// Each pixel is split into 3x3 sub-samples carrying a ninth of its
/// background-subtracted value; the half-flux radius is interpolated between
/// the two sub-samples straddling half the cumulative flux.
fn half_flux_diameter(pixels: &Buffer2<f32>, center: DVec2, radius: f64, background: f32) -> f32 {
    let (xs, ys) = window(pixels, center, radius + 1.0);
    let mut samples: Vec<(f64, f64)> = Vec::new();

    for y in ys {
        for x in xs.clone() {
            let v = pixels[(x, y)];
            if !v.is_finite() {
                continue;
            }
            let share = (v - background) as f64 / 9.0;
            for dy in SUBPIXEL_OFFSETS {
                for dx in SUBPIXEL_OFFSETS {
                    let r = DVec2::new(x as f64 + dx, y as f64 + dy).distance(center);
                    if r <= radius {
                        samples.push((r, share));
                    }
                }
            }
        }
    }

    let total: f64 = samples.iter().map(|&(_, v)| v).sum();
    if total <= 0.0 {
        return f32::NAN;
    }

    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let half = total / 2.0;
    let mut cumulative = 0.0;
    let mut prev_r = 0.0;
    for &(r, v) in &samples {
        let next = cumulative + v;
        if next >= half {
            let t = if v > 0.0 { (half - cumulative) / v } else { 1.0 };
            let r_half = prev_r + t.clamp(0.0, 1.0) * (r - prev_r);
            return (2.0 * r_half) as f32;
        }
        cumulative = next;
        prev_r = r;
    }

    f32::NAN
}

/// Width at half of the peak amplitude of the ring-averaged radial profile.
///
/// Rings are one pixel wide; each contributes its mean radius and mean value.
/// The profile starts at `(0, amplitude)` and the half-maximum crossing is
/// linearly interpolated between neighbouring rings.
fn full_width_half_max(
    pixels: &Buffer2<f32>,
    center: DVec2,
    radius: f64,
    background: f32,
    amplitude: f64,
) -> f32 {
    if amplitude <= 0.0 {
        return f32::NAN;
    }

    let ring_count = radius.floor() as usize + 1;
    let mut radii = vec![Accumulator::new(); ring_count];
    let mut values = vec![Accumulator::new(); ring_count];

    let (xs, ys) = window(pixels, center, radius);
    for y in ys {
        for x in xs.clone() {
            let v = pixels[(x, y)];
            let r = DVec2::new(x as f64, y as f64).distance(center);
            if !v.is_finite() || r > radius {
                continue;
            }
            let ring = (r.floor() as usize).min(ring_count - 1);
            radii[ring].push(r);
            values[ring].push((v - background) as f64);
        }
    }

    let half = amplitude / 2.0;
    let mut prev = (0.0, amplitude);
    for (r, v) in radii.iter().zip(&values) {
        if v.is_empty() {
            continue;
        }
        let (r, v) = (r.mean(), v.mean());
        if v <= half {
            let t = (prev.1 - half) / (prev.1 - v);
            return (2.0 * (prev.0 + t * (r - prev.0))) as f32;
        }
        prev = (r, v);
    }

    f32::NAN
}
