//! Focus curve solving.
//!
//! Each autofocus step measures a frame metric (median HFD or FWHM) at a
//! focuser position and hands it to [`FocusCurveSolver::sample_at`]. Once the
//! lowest point has samples on both sides, or enough samples rising away from
//! one end of the run, a hyperbola is fitted through the per-position
//! medians; its vertex is the best focus position.
//!
//! ```rust,ignore
//! let mut solver = FocusCurveSolver::new(SampleKind::Hfd, FocusConfig::default());
//! for position in (start..=end).step_by(step) {
//!     let stars = find_stars(&capture(position)?, 10.0, 500, 3);
//!     let hfd = median_star_property(&stars, SampleKind::Hfd);
//!     let outcome = solver.sample_at(position, hfd, stars.len(), 20);
//!     if let Some(solution) = outcome.solution {
//!         focuser.move_to(solution.position.round() as i32)?;
//!         break;
//!     }
//! }
//! ```

mod hyperbola;
mod sample_map;
mod solver;


pub use hyperbola::{Hyperbola, HyperbolaFit, fit_hyperbola};
pub use sample_map::{FocusSample, MetricSampleMap};
pub use solver::{FocusConfig, FocusCurveSolver, FocusSolution, SampleOutcome, SolverState};
