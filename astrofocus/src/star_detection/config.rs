//! Configuration types for star detection.
//!
//! All parameters have defaults tuned for guide and main-camera frames at
//! typical amateur image scales. Configs are `serde` types so callers can keep
//! them in YAML or JSON next to their equipment profiles.

use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Pixel connectivity for connected component labeling.
///
/// Determines which pixels are considered neighbors when grouping
/// above-threshold pixels into candidates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Only horizontal and vertical neighbors are connected.
    #[default]
    Four,
    /// Diagonal neighbors are connected too. Merges close pairs more readily.
    Eight,
}

// ============================================================================
// Background
// ============================================================================

/// Global background and noise estimation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Clipping threshold in sigma for the iterative median/MAD estimate.
    pub sigma_clip_kappa: f32,
    /// Number of clipping passes.
    pub sigma_clip_iterations: usize,
    /// Pixel population above which a strided subsample is used.
    pub max_samples: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            sigma_clip_kappa: 3.0,
            sigma_clip_iterations: 5,
            max_samples: 250_000,
        }
    }
}

impl BackgroundConfig {
    pub fn validate(&self) {
        assert!(
            self.sigma_clip_kappa > 0.0,
            "sigma_clip_kappa must be positive, got {}",
            self.sigma_clip_kappa
        );
        assert!(
            self.sigma_clip_iterations >= 1,
            "sigma_clip_iterations must be at least 1"
        );
        assert!(
            self.max_samples >= 1000,
            "max_samples must be at least 1000, got {}",
            self.max_samples
        );
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Star detection configuration.
///
/// The detection threshold is `background + scale * noise`. The scale starts
/// at `initial_sigma` and is adjusted between passes: crowded frames raise it
/// by `sigma_step`, sparse frames lower it down to `min_sigma`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StarDetectionConfig {
    pub background: BackgroundConfig,
    pub connectivity: Connectivity,

    // -- Threshold search --
    /// Threshold scale of the first pass, in units of noise sigma.
    pub initial_sigma: f32,
    /// Lowest scale a sparse frame may drop to.
    pub min_sigma: f32,
    /// Scale change between passes.
    pub sigma_step: f32,
    /// A pass is crowded when it yields more than `crowded_factor * max_stars` candidates.
    pub crowded_factor: usize,
    /// A pass is sparse when it yields fewer candidates than this.
    pub min_usable_candidates: usize,

    // -- Candidate filtering --
    /// Minimum pixels above threshold for a candidate.
    pub min_area: usize,
    /// Maximum pixels above threshold. Larger blobs are nebulosity or satellites.
    pub max_area: usize,
    /// Candidates whose bounding box comes closer than this to the border are dropped.
    pub edge_margin: usize,
    /// Candidates with more saturated pixels than this are dropped.
    pub max_saturated_pixels: usize,

    // -- Measurement --
    /// Candidates with fewer pixels get NaN HFD and FWHM.
    pub min_measurable_area: usize,
    /// Upper bound on centroid refinement passes.
    pub max_centroid_iterations: usize,
    /// Smallest measurement aperture radius in pixels.
    pub min_aperture_radius: usize,
    /// Largest measurement aperture radius in pixels.
    pub max_aperture_radius: usize,

    /// Run a 3x3 median filter over Bayer frames before detection.
    pub median_filter_cfa: bool,
}

impl Default for StarDetectionConfig {
    fn default() -> Self {
        Self {
            background: BackgroundConfig::default(),
            connectivity: Connectivity::Four,
            initial_sigma: 4.0,
            min_sigma: 2.5,
            sigma_step: 1.5,
            crowded_factor: 4,
            min_usable_candidates: 10,
            min_area: 3,
            max_area: 2500,
            edge_margin: 1,
            max_saturated_pixels: 0,
            min_measurable_area: 4,
            max_centroid_iterations: 10,
            min_aperture_radius: 4,
            max_aperture_radius: 24,
            median_filter_cfa: true,
        }
    }
}

impl StarDetectionConfig {
    /// Panics on values that cannot produce a meaningful detection.
    pub fn validate(&self) {
        self.background.validate();

        assert!(
            self.min_sigma > 0.0,
            "min_sigma must be positive, got {}",
            self.min_sigma
        );
        assert!(
            self.initial_sigma >= self.min_sigma,
            "initial_sigma ({}) must be >= min_sigma ({})",
            self.initial_sigma,
            self.min_sigma
        );
        assert!(
            self.sigma_step > 0.0,
            "sigma_step must be positive, got {}",
            self.sigma_step
        );
        assert!(self.crowded_factor >= 1, "crowded_factor must be at least 1");
        assert!(self.min_area >= 1, "min_area must be at least 1");
        assert!(
            self.max_area >= self.min_area,
            "max_area ({}) must be >= min_area ({})",
            self.max_area,
            self.min_area
        );
        assert!(
            self.max_centroid_iterations >= 1,
            "max_centroid_iterations must be at least 1"
        );
        assert!(
            self.min_aperture_radius >= 2,
            "min_aperture_radius must be at least 2, got {}",
            self.min_aperture_radius
        );
        assert!(
            self.max_aperture_radius >= self.min_aperture_radius,
            "max_aperture_radius ({}) must be >= min_aperture_radius ({})",
            self.max_aperture_radius,
            self.min_aperture_radius
        );
    }
}
