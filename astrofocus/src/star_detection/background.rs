//! Global background level and noise estimation.

use crate::math::{Accumulator, sigma_clipped_median_mad};

use super::config::BackgroundConfig;

/// Noise never drops below this, so SNR stays finite on synthetic flat frames.
const MIN_NOISE: f32 = 1e-6;

/// Sigma at which the MAD estimate is considered collapsed.
const COLLAPSED_SIGMA: f32 = 1e-3;

/// Sky level and per-pixel noise of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Background {
    pub level: f32,
    pub noise: f32,
}

impl Background {
    /// Pixel value corresponding to `scale` noise sigmas above the sky.
    #[inline]
    pub fn threshold(&self, scale: f32) -> f32 {
        self.level + scale * self.noise
    }

    /// Peak signal over background in noise units.
    #[inline]
    pub fn snr(&self, peak: f32) -> f32 {
        (peak - self.level) / self.noise
    }
}

/// Sigma-clipped median and MAD sigma over the finite pixels.
///
/// Above `max_samples` pixels a fixed stride is used, so the estimate is
/// deterministic for a given frame.
pub(crate) fn estimate_background(pixels: &[f32], config: &BackgroundConfig) -> Background {
    let stride = pixels.len().div_ceil(config.max_samples).max(1);
    let mut samples: Vec<f32> = pixels
        .iter()
        .step_by(stride)
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if samples.is_empty() {
        return Background {
            level: 0.0,
            noise: MIN_NOISE,
        };
    }

    // Clipping reorders the samples; keep the moments from before.
    let moments: Accumulator = samples.iter().map(|&v| v as f64).collect();

    let mut deviations = Vec::with_capacity(samples.len());
    let (level, mut noise) = sigma_clipped_median_mad(
        &mut samples,
        &mut deviations,
        config.sigma_clip_kappa,
        config.sigma_clip_iterations,
    );

    if noise < COLLAPSED_SIGMA {
        noise = moments.std_dev() as f32;
        tracing::debug!(level, noise, "MAD collapsed, using standard deviation");
    }

    Background {
        level,
        noise: noise.max(MIN_NOISE),
    }
}
