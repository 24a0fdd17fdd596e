//! Adaptive detection threshold.

use super::config::StarDetectionConfig;

/// State of the threshold retry loop.
///
/// Each pass reports its candidate count through [`advance`](Self::advance),
/// which decides whether another pass at a different scale is worthwhile.
/// Counts are taken before any SNR filtering, so the chosen scale does not
/// depend on the caller's SNR cut.
#[derive(Debug, Clone)]
pub(crate) struct ThresholdSearch {
    scale: f32,
    min_scale: f32,
    max_scale: f32,
    step: f32,
    crowded_limit: usize,
    min_usable: usize,
    iteration: usize,
    max_iterations: usize,
    last_count: Option<usize>,
}

impl ThresholdSearch {
    /// `max_scale` is the scale at which the threshold reaches the brightest pixel.
    /// At least one pass always runs, even with `max_iterations == 0`.
    pub fn new(
        config: &StarDetectionConfig,
        max_stars: usize,
        max_iterations: usize,
        max_scale: f32,
    ) -> Self {
        let min_scale = config.min_sigma;
        // NaN (blank frame) collapses to the lower bound.
        let max_scale = max_scale.max(min_scale);

        Self {
            scale: config.initial_sigma.clamp(min_scale, max_scale),
            min_scale,
            max_scale,
            step: config.sigma_step,
            crowded_limit: config.crowded_factor.saturating_mul(max_stars),
            min_usable: config.min_usable_candidates,
            iteration: 0,
            max_iterations: max_iterations.max(1),
            last_count: None,
        }
    }

    /// Threshold scale for the next pass.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Passes completed so far.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    pub fn last_count(&self) -> Option<usize> {
        self.last_count
    }

    /// Record a finished pass. Returns `true` when another pass should run
    /// at the updated [`scale`](Self::scale).
    pub fn advance(&mut self, candidates: usize) -> bool {
        self.iteration += 1;
        self.last_count = Some(candidates);

        if self.iteration >= self.max_iterations {
            return false;
        }

        let next = if candidates > self.crowded_limit {
            (self.scale + self.step).min(self.max_scale)
        } else if candidates < self.min_usable {
            (self.scale - self.step).max(self.min_scale)
        } else {
            return false;
        };

        if next == self.scale {
            return false;
        }

        self.scale = next;
        true
    }
}
