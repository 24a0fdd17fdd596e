//! Frame-level focus metrics aggregated from star lists.

use serde::{Deserialize, Serialize};

use crate::math::median_f32_mut;
use crate::star_detection::Star;

/// Star property used as the focus metric.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleKind {
    /// Half-flux diameter.
    #[default]
    Hfd,
    /// Full width at half maximum.
    Fwhm,
}

impl SampleKind {
    pub fn name(self) -> &'static str {
        match self {
            SampleKind::Hfd => "HFD",
            SampleKind::Fwhm => "FWHM",
        }
    }

    /// The property of `star` this kind selects.
    #[inline]
    pub fn of(self, star: &Star) -> f32 {
        match self {
            SampleKind::Hfd => star.hfd,
            SampleKind::Fwhm => star.fwhm,
        }
    }
}

/// Median of the measurable values of `kind` over `stars`.
///
/// NaN, infinite and negative values are skipped. Returns NaN when nothing
/// measurable is left.
pub fn median_star_property(stars: &[Star], kind: SampleKind) -> f32 {
    let mut values: Vec<f32> = stars
        .iter()
        .map(|s| kind.of(s))
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();

    median_f32_mut(&mut values)
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;

    fn star(hfd: f32, fwhm: f32) -> Star {
        Star {
            pos: DVec2::ZERO,
            snr: 20.0,
            hfd,
            fwhm,
            flux: 1000.0,
            peak: 500.0,
        }
    }

    #[test]
    fn test_median_skips_unmeasurable() {
        let stars = [
            star(3.0, 2.5),
            star(f32::NAN, f32::NAN),
            star(5.0, 4.0),
            star(4.0, f32::NAN),
        ];
        assert_eq!(median_star_property(&stars, SampleKind::Hfd), 4.0);
        assert_eq!(median_star_property(&stars, SampleKind::Fwhm), 3.25);
    }

    #[test]
    fn test_median_of_nothing_is_nan() {
        assert!(median_star_property(&[], SampleKind::Hfd).is_nan());
        let stars = [star(f32::NAN, f32::NAN)];
        assert!(median_star_property(&stars, SampleKind::Fwhm).is_nan());
    }

    #[test]
    fn test_negative_and_infinite_values_are_skipped() {
        let stars = [star(-1.0, 2.0), star(f32::INFINITY, 2.0), star(6.0, 2.0)];
        assert_eq!(median_star_property(&stars, SampleKind::Hfd), 6.0);
    }

    #[test]
    fn test_kind_selects_property() {
        let s = star(3.0, 2.0);
        assert_eq!(SampleKind::Hfd.of(&s), 3.0);
        assert_eq!(SampleKind::Fwhm.of(&s), 2.0);
        assert_eq!(SampleKind::Fwhm.name(), "FWHM");
    }
}
