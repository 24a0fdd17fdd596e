//! Star detection result types.

use glam::DVec2;

/// A detected star with sub-pixel position and focus metrics.
///
/// `hfd` and `fwhm` are NaN when the profile could not be measured
/// (saturated core, too few pixels, aperture off the frame, no half-maximum crossing).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    /// Intensity-weighted centroid in pixel coordinates.
    pub pos: DVec2,
    /// Peak signal over background, in units of background noise.
    pub snr: f32,
    /// Half-flux diameter in pixels.
    pub hfd: f32,
    /// Full width at half maximum in pixels.
    pub fwhm: f32,
    /// Background-subtracted flux inside the measurement aperture.
    pub flux: f32,
    /// Peak pixel value, background included.
    pub peak: f32,
}

impl Star {
    /// Both focus metrics are available.
    pub fn is_measurable(&self) -> bool {
        self.hfd.is_finite() && self.fwhm.is_finite()
    }
}
