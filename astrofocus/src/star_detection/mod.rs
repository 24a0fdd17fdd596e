//! Star detection.
//!
//! Pipeline for one frame:
//! 1. Optional 3x3 median filter for Bayer sensors
//! 2. Global background and noise (sigma-clipped median / MAD)
//! 3. Threshold mask and connected components, repeated at adjusted
//!    thresholds while the frame looks crowded or sparse
//! 4. Shape filters (area, border, saturation) and the SNR cut
//! 5. Centroid, flux, HFD and FWHM per surviving candidate (parallel)

mod background;
pub mod config;
mod labeling;
mod measure;
mod median_filter;
pub mod star;
mod threshold;

#[cfg(test)]
mod tests;

use std::borrow::Cow;

use common::buffer2::Buffer2;
use rayon::prelude::*;

use crate::image::Image;

use background::estimate_background;
use labeling::detect_candidates;
use measure::measure_star;
use median_filter::median_filter_3x3;
use threshold::ThresholdSearch;

pub use config::{BackgroundConfig, Connectivity, StarDetectionConfig};
pub use star::Star;

/// Star list size used when the caller has no preference.
pub const DEFAULT_MAX_STARS: usize = 500;

/// Threshold passes used when the caller has no preference.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Result of star detection with diagnostics.
#[derive(Debug, Clone)]
pub struct StarDetectionResult {
    /// Detected stars sorted by SNR (brightest first).
    pub stars: Vec<Star>,
    /// Diagnostic information from the detection pipeline.
    pub diagnostics: StarDetectionDiagnostics,
}

/// Counts and levels from the final threshold pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarDetectionDiagnostics {
    /// Sky level in ADU.
    pub background: f32,
    /// Per-pixel noise sigma in ADU.
    pub noise: f32,
    /// Threshold scale of the final pass, in noise sigmas.
    pub threshold_sigma: f32,
    /// Threshold passes run.
    pub iterations: usize,
    pub pixels_above_threshold: usize,
    pub connected_components: usize,
    pub rejected_small: usize,
    pub rejected_edge: usize,
    pub rejected_large: usize,
    pub rejected_saturated: usize,
    pub rejected_low_snr: usize,
    /// Stars dropped by the `max_stars` cut.
    pub truncated: usize,
    pub final_star_count: usize,
}

// =============================================================================
// StarDetector
// =============================================================================

/// Star detector holding a validated [`StarDetectionConfig`].
///
/// # Example
///
/// ```rust,ignore
/// use astrofocus::{StarDetector, Image};
///
/// let image = Image::read_fits("frame.fits")?;
/// let detector = StarDetector::new();
/// let result = detector.find_stars(&image, 10.0, 500, 3);
/// for star in &result.stars {
///     println!("{:.2} {:.2} snr={:.1} hfd={:.2}", star.pos.x, star.pos.y, star.snr, star.hfd);
/// }
/// ```
#[derive(Debug, Default)]
pub struct StarDetector {
    config: StarDetectionConfig,
}

impl StarDetector {
    /// Create a new star detector with default configuration.
    pub fn new() -> Self {
        Self {
            config: StarDetectionConfig::default(),
        }
    }

    /// Create a star detector from an existing configuration.
    ///
    /// # Panics
    /// If the configuration fails [`StarDetectionConfig::validate`].
    pub fn from_config(config: StarDetectionConfig) -> Self {
        config.validate();
        Self { config }
    }

    /// Get reference to the underlying configuration.
    pub fn config(&self) -> &StarDetectionConfig {
        &self.config
    }

    /// Detect up to `max_stars` stars with `snr >= snr_min`.
    ///
    /// Runs at least one and at most `max_iterations` threshold passes.
    /// Stars come back sorted by descending SNR; ties are broken by the peak
    /// pixel's row, then column. An empty list is a valid result.
    pub fn find_stars(
        &self,
        image: &Image,
        snr_min: f32,
        max_stars: usize,
        max_iterations: usize,
    ) -> StarDetectionResult {
        let config = &self.config;
        let pixels = self.prepare(image);

        let background = estimate_background(pixels.pixels(), &config.background);
        let saturation = image
            .bit_depth()
            .saturation_value()
            .map(|s| s - image.black_level());

        let max_scale = (image.max_value() - background.level) / background.noise;
        let mut search = ThresholdSearch::new(config, max_stars, max_iterations, max_scale);

        let pass = loop {
            let pass = detect_candidates(&pixels, &background, search.scale(), saturation, config);
            tracing::debug!(
                iteration = search.iterations() + 1,
                scale = search.scale(),
                candidates = pass.candidates.len(),
                components = pass.connected_components,
                "threshold pass"
            );
            if !search.advance(pass.candidates.len()) {
                break pass;
            }
        };

        let mut diagnostics = StarDetectionDiagnostics {
            background: background.level,
            noise: background.noise,
            threshold_sigma: search.scale(),
            iterations: search.iterations(),
            pixels_above_threshold: pass.pixels_above_threshold,
            connected_components: pass.connected_components,
            rejected_small: pass.rejected_small,
            rejected_edge: pass.rejected_edge,
            rejected_large: pass.rejected_large,
            rejected_saturated: pass.rejected_saturated,
            ..Default::default()
        };

        let before_snr = pass.candidates.len();
        let mut candidates: Vec<_> = pass
            .candidates
            .into_iter()
            .filter(|c| background.snr(c.peak_value) >= snr_min)
            .collect();
        diagnostics.rejected_low_snr = before_snr - candidates.len();

        // SNR grows with the peak, so this is the final order.
        candidates.sort_by(|a, b| {
            b.peak_value
                .total_cmp(&a.peak_value)
                .then(a.peak_y.cmp(&b.peak_y))
                .then(a.peak_x.cmp(&b.peak_x))
        });
        diagnostics.truncated = candidates.len().saturating_sub(max_stars);
        candidates.truncate(max_stars);

        let stars: Vec<Star> = candidates
            .par_iter()
            .map(|c| measure_star(&pixels, c, &background, config))
            .collect();

        diagnostics.final_star_count = stars.len();

        tracing::debug!(
            background = diagnostics.background,
            noise = diagnostics.noise,
            threshold_sigma = diagnostics.threshold_sigma,
            iterations = diagnostics.iterations,
            stars = stars.len(),
            snr_min,
            "star detection finished"
        );

        StarDetectionResult { stars, diagnostics }
    }

    /// Working copy of the pixels, median filtered for Bayer sensors.
    fn prepare<'a>(&self, image: &'a Image) -> Cow<'a, Buffer2<f32>> {
        if self.config.median_filter_cfa && image.meta().sensor_type.is_cfa() {
            Cow::Owned(median_filter_3x3(image.pixels()))
        } else {
            Cow::Borrowed(image.pixels())
        }
    }
}

/// Detect stars with the default configuration.
///
/// See [`StarDetector::find_stars`].
pub fn find_stars(image: &Image, snr_min: f32, max_stars: usize, max_iterations: usize) -> Vec<Star> {
    StarDetector::new()
        .find_stars(image, snr_min, max_stars, max_iterations)
        .stars
}
