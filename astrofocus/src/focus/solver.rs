use chrono::Utc;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::metrics::SampleKind;

use super::hyperbola::{Hyperbola, fit_hyperbola};
use super::sample_map::{FocusSample, MetricSampleMap};

/// Acceptance rules for a focus curve.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FocusConfig {
    /// Curve points required strictly on each side of the lowest point.
    /// A lowest point at either end of the curve needs twice as many on
    /// its one side instead.
    pub min_points_per_side: usize,
    /// Largest relative RMS fit error that still counts as a solution.
    pub max_fit_error: f64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            min_points_per_side: 1,
            max_fit_error: 0.15,
        }
    }
}

impl FocusConfig {
    pub fn validate(&self) {
        assert!(
            self.min_points_per_side >= 1,
            "min_points_per_side must be at least 1"
        );
        assert!(
            self.max_fit_error > 0.0,
            "max_fit_error must be positive, got {}",
            self.max_fit_error
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverState {
    /// Too few curve points around the lowest one to fit.
    #[default]
    Collecting,
    /// Enough points to fit, but the last fit was rejected.
    Solvable,
    /// The last fit was accepted.
    Solved,
}

/// Best-focus estimate from a fitted V-curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusSolution {
    /// Vertex of the fitted hyperbola. Round before moving the focuser.
    pub position: f64,
    /// Lowest position that contributed a curve point.
    pub min_position: i32,
    /// Highest position that contributed a curve point.
    pub max_position: i32,
    /// Relative RMS fit error.
    pub error: f64,
    pub iterations: usize,
    pub curve: Hyperbola,
}

/// Result of [`FocusCurveSolver::sample_at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    pub solution: Option<FocusSolution>,
    /// Lowest position sampled so far, including positions without a finite metric.
    pub min_position: i32,
    /// Highest position sampled so far.
    pub max_position: i32,
}

/// Accumulates focus samples and fits a hyperbola once the minimum is located.
#[derive(Debug, Clone)]
pub struct FocusCurveSolver {
    config: FocusConfig,
    samples: MetricSampleMap,
    state: SolverState,
}

impl FocusCurveSolver {
    /// # Panics
    /// If the configuration fails [`FocusConfig::validate`].
    pub fn new(kind: SampleKind, config: FocusConfig) -> Self {
        config.validate();
        Self {
            config,
            samples: MetricSampleMap::new(kind),
            state: SolverState::Collecting,
        }
    }

    pub fn kind(&self) -> SampleKind {
        self.samples.kind()
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn samples(&self) -> &MetricSampleMap {
        &self.samples
    }

    /// Record a measurement and try to solve the curve.
    ///
    /// `metric` may be NaN; the sample still extends the reported range but
    /// does not enter the fit. The fit runs at most `max_iterations` passes.
    pub fn sample_at(
        &mut self,
        position: i32,
        metric: f32,
        star_count: usize,
        max_iterations: usize,
    ) -> SampleOutcome {
        self.samples.add(FocusSample {
            position,
            metric,
            star_count,
            recorded_at: Utc::now(),
        });

        let min_position = self.samples.min_position().unwrap_or(position);
        let max_position = self.samples.max_position().unwrap_or(position);

        let points = self.samples.curve_points();
        let solvable = self.is_solvable(&points);
        let solution = if solvable {
            self.solve(&points, max_iterations)
        } else {
            None
        };

        self.state = match (&solution, solvable) {
            (Some(_), _) => SolverState::Solved,
            (None, true) => SolverState::Solvable,
            (None, false) => SolverState::Collecting,
        };

        if let Some(solution) = &solution {
            tracing::info!(
                kind = self.kind().name(),
                position = solution.position,
                error = solution.error,
                iterations = solution.iterations,
                samples = self.samples.len(),
                "focus curve solved"
            );
        }

        SampleOutcome {
            solution,
            min_position,
            max_position,
        }
    }

    /// The lowest curve point is bracketed by enough points on both sides,
    /// or sits at one end of the curve with twice that many on the other.
    ///
    /// In the second case the fit extrapolates the missing branch and
    /// [`Self::solve`] decides whether the vertex really is at that end.
    fn is_solvable(&self, points: &[DVec2]) -> bool {
        let Some(lowest) = points
            .iter()
            .enumerate()
            .min_by(|(_, l), (_, r)| l.y.total_cmp(&r.y))
            .map(|(i, _)| i)
        else {
            return false;
        };
        let k = self.config.min_points_per_side;
        match (lowest, points.len() - 1 - lowest) {
            (0, right) => right >= 2 * k,
            (left, 0) => left >= 2 * k,
            (left, right) => left >= k && right >= k,
        }
    }

    fn solve(&self, points: &[DVec2], max_iterations: usize) -> Option<FocusSolution> {
        let fit = fit_hyperbola(points, max_iterations)?;
        let min_position = points.first()?.x;
        let max_position = points.last()?.x;
        let (low, high) = vertex_window(points)?;

        let accepted = fit.error < self.config.max_fit_error
            && fit.curve.a > 0.0
            && fit.curve.b > 0.0
            && (low..=high).contains(&fit.curve.p);

        if !accepted {
            tracing::debug!(
                error = fit.error,
                p = fit.curve.p,
                "focus curve fit rejected"
            );
            return None;
        }

        Some(FocusSolution {
            position: fit.curve.p,
            min_position: min_position as i32,
            max_position: max_position as i32,
            error: fit.error,
            iterations: fit.iterations,
            curve: fit.curve,
        })
    }
}

/// Range a fitted vertex must fall in: the sampled positions widened by half
/// the outermost spacing on each side, so a vertex nearer the end sample
/// than to the next unsampled step still counts.
fn vertex_window(points: &[DVec2]) -> Option<(f64, f64)> {
    let [first, second, ..] = points else {
        return None;
    };
    let [.., before_last, last] = points else {
        return None;
    };
    Some((
        first.x - (second.x - first.x) / 2.0,
        last.x + (last.x - before_last.x) / 2.0,
    ))
}
