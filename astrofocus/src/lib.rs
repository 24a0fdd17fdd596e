//! Astrofocus - star analysis and autofocus for astronomical cameras.
//!
//! This library provides:
//! - A native FITS codec with bit-exact round trips
//! - Ingestion of raw camera readout buffers
//! - Star detection with sub-pixel centroids, SNR, HFD and FWHM
//! - A hyperbolic V-curve solver for finding best focus
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use astrofocus::{FocusConfig, FocusCurveSolver, Image, SampleKind};
//! use astrofocus::{find_stars, median_star_property};
//!
//! let mut solver = FocusCurveSolver::new(SampleKind::Hfd, FocusConfig::default());
//!
//! for path in frames {
//!     let image = Image::from_file(&path)?;
//!     let stars = find_stars(&image, 10.0, 500, 3);
//!     let hfd = median_star_property(&stars, SampleKind::Hfd);
//!     let outcome = solver.sample_at(image.meta().focus_position, hfd, stars.len(), 20);
//!     if let Some(solution) = outcome.solution {
//!         println!("best focus at {}", solution.position.round());
//!     }
//! }
//! ```

pub mod focus;
pub mod image;
pub(crate) mod math;
pub mod metrics;
pub mod star_detection;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Core image types
// ============================================================================

pub use image::{
    BitDepth, Endianness, Image, ImageError, ImageMeta, ImageSourceFormat, RowOrder, SensorType,
    SourceLayout,
};

// ============================================================================
// Statistics
// ============================================================================

pub use math::Accumulator;

// ============================================================================
// Star detection
// ============================================================================

pub use star_detection::{
    BackgroundConfig, Connectivity, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_STARS, Star,
    StarDetectionConfig, StarDetectionDiagnostics, StarDetectionResult, StarDetector, find_stars,
};

// ============================================================================
// Focus
// ============================================================================

pub use focus::{
    FocusConfig, FocusCurveSolver, FocusSample, FocusSolution, Hyperbola, MetricSampleMap,
    SampleOutcome, SolverState,
};
pub use metrics::{SampleKind, median_star_property};
