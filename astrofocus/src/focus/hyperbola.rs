//! Hyperbolic V-curve model and its least-error grid fit.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Grid points per parameter and iteration, centre included.
const GRID_STEPS: i32 = 21;

/// Vertex grid spacing, in focuser steps, at which refinement stops.
const P_RESOLUTION: f64 = 0.01;

/// Error treated as an exact fit.
const EXACT_FIT: f64 = 1e-9;

/// `y = b * sqrt(1 + ((x - p) / a)^2)`.
///
/// `p` is the vertex (best focus), `b` the metric at the vertex and `a`
/// controls how steeply the arms rise.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Hyperbola {
    pub p: f64,
    pub a: f64,
    pub b: f64,
}

impl Hyperbola {
    #[inline]
    pub fn value(&self, x: f64) -> f64 {
        let t = (x - self.p) / self.a;
        self.b * (1.0 + t * t).sqrt()
    }

    /// Root mean square of the relative residuals `(model - y) / y`.
    pub fn relative_error(&self, points: &[DVec2]) -> f64 {
        if points.is_empty() {
            return f64::NAN;
        }
        let sum: f64 = points
            .iter()
            .map(|pt| {
                let r = (self.value(pt.x) - pt.y) / pt.y;
                r * r
            })
            .sum();
        (sum / points.len() as f64).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HyperbolaFit {
    pub curve: Hyperbola,
    pub error: f64,
    /// Refinement passes run, at most the requested maximum.
    pub iterations: usize,
}

/// Fit a [`Hyperbola`] through `points` by iterative grid refinement.
///
/// Each pass evaluates a 21x21x21 grid around the current best parameters and
/// halves the search ranges. Stops once the vertex grid is finer than 0.01
/// focuser steps, on an exact fit, or after `max_iterations` passes (at
/// least one).
///
/// Returns `None` for fewer than three points, a single position, or
/// non-positive metrics.
pub fn fit_hyperbola(points: &[DVec2], max_iterations: usize) -> Option<HyperbolaFit> {
    if points.len() < 3 || points.iter().any(|pt| !pt.y.is_finite() || pt.y <= 0.0) {
        return None;
    }

    let x_min = points.iter().map(|pt| pt.x).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|pt| pt.x).fold(f64::NEG_INFINITY, f64::max);
    let span = x_max - x_min;
    if span <= 0.0 {
        return None;
    }

    let lowest = points.iter().min_by(|l, r| l.y.total_cmp(&r.y))?;
    let highest = points.iter().max_by(|l, r| l.y.total_cmp(&r.y))?;

    let mut best = Hyperbola {
        p: lowest.x,
        a: initial_slope(lowest, highest, span),
        b: lowest.y,
    };
    let mut best_error = best.relative_error(points);

    let mut p_range = span / 2.0;
    let mut a_range = best.a;
    let mut b_range = best.b / 2.0;

    let max_iterations = max_iterations.max(1);
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        let center = best;

        for i in 0..GRID_STEPS {
            let p = center.p + p_range * grid_offset(i);
            for j in 0..GRID_STEPS {
                let a = center.a + a_range * grid_offset(j);
                if a <= 0.0 {
                    continue;
                }
                for k in 0..GRID_STEPS {
                    let b = center.b + b_range * grid_offset(k);
                    if b <= 0.0 {
                        continue;
                    }
                    let candidate = Hyperbola { p, a, b };
                    let error = candidate.relative_error(points);
                    if error < best_error {
                        best_error = error;
                        best = candidate;
                    }
                }
            }
        }

        p_range /= 2.0;
        a_range /= 2.0;
        b_range /= 2.0;

        if p_range * grid_offset(GRID_STEPS / 2 + 1) < P_RESOLUTION || best_error < EXACT_FIT {
            break;
        }
    }

    tracing::debug!(
        p = best.p,
        a = best.a,
        b = best.b,
        error = best_error,
        iterations,
        points = points.len(),
        "hyperbola fit"
    );

    Some(HyperbolaFit {
        curve: best,
        error: best_error,
        iterations,
    })
}

/// Grid position in `[-1, 1]`.
#[inline]
fn grid_offset(step: i32) -> f64 {
    let half = (GRID_STEPS - 1) / 2;
    (step - half) as f64 / half as f64
}

/// Slope parameter that passes the hyperbola through the highest point,
/// assuming the vertex sits at the lowest one.
fn initial_slope(lowest: &DVec2, highest: &DVec2, span: f64) -> f64 {
    let ratio = highest.y / lowest.y;
    let dx = (highest.x - lowest.x).abs();
    if ratio > 1.0 + 1e-6 && dx > 0.0 {
        dx / (ratio * ratio - 1.0).sqrt()
    } else {
        span
    }
}
