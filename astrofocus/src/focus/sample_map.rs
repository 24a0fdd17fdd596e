use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use glam::DVec2;

use crate::math::median_f32_mut;
use crate::metrics::SampleKind;

/// One focus measurement. Never mutated once recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusSample {
    pub position: i32,
    /// Frame metric; NaN when the frame had no measurable stars.
    pub metric: f32,
    pub star_count: usize,
    pub recorded_at: DateTime<Utc>,
}

/// All samples of one autofocus run, grouped by focuser position.
#[derive(Debug, Clone)]
pub struct MetricSampleMap {
    kind: SampleKind,
    samples: BTreeMap<i32, Vec<FocusSample>>,
}

impl MetricSampleMap {
    pub fn new(kind: SampleKind) -> Self {
        Self {
            kind,
            samples: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    pub fn add(&mut self, sample: FocusSample) {
        self.samples.entry(sample.position).or_default().push(sample);
    }

    /// Samples recorded at `position`, oldest first.
    pub fn at(&self, position: i32) -> &[FocusSample] {
        self.samples.get(&position).map_or(&[], Vec::as_slice)
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sampled positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = i32> + '_ {
        self.samples.keys().copied()
    }

    pub fn min_position(&self) -> Option<i32> {
        self.samples.keys().next().copied()
    }

    pub fn max_position(&self) -> Option<i32> {
        self.samples.keys().next_back().copied()
    }

    /// One `(position, median metric)` point per position with at least one
    /// finite metric, in ascending position order.
    pub fn curve_points(&self) -> Vec<DVec2> {
        self.samples
            .iter()
            .filter_map(|(&position, samples)| {
                let mut metrics: Vec<f32> = samples
                    .iter()
                    .map(|s| s.metric)
                    .filter(|m| m.is_finite())
                    .collect();
                if metrics.is_empty() {
                    return None;
                }
                let median = median_f32_mut(&mut metrics);
                Some(DVec2::new(position as f64, median as f64))
            })
            .collect()
    }
}
