//! Thresholding and connected component labeling.
//!
//! A pass marks every pixel above `background + scale * noise`, groups the
//! marked pixels with a two-pass union-find, and reduces each component to a
//! [`Candidate`] with its bounding box, peak and saturation count.

use common::buffer2::Buffer2;

use super::background::Background;
use super::config::{Connectivity, StarDetectionConfig};

/// A connected region above threshold, before measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
    pub peak_x: usize,
    pub peak_y: usize,
    pub peak_value: f32,
    /// Number of pixels in the region.
    pub area: usize,
    /// Pixels at or above the sensor saturation value.
    pub saturated: usize,
}

impl Candidate {
    fn new(x: usize, y: usize, value: f32) -> Self {
        Self {
            x_min: x,
            x_max: x,
            y_min: y,
            y_max: y,
            peak_x: x,
            peak_y: y,
            peak_value: value,
            area: 0,
            saturated: 0,
        }
    }

    fn add(&mut self, x: usize, y: usize, value: f32, saturated: bool) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
        if value > self.peak_value {
            self.peak_x = x;
            self.peak_y = y;
            self.peak_value = value;
        }
        self.area += 1;
        self.saturated += saturated as usize;
    }
}

/// Outcome of one thresholding pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct CandidatePass {
    /// Candidates that survived the shape filters, in label order.
    pub candidates: Vec<Candidate>,
    pub pixels_above_threshold: usize,
    pub connected_components: usize,
    pub rejected_small: usize,
    pub rejected_edge: usize,
    pub rejected_large: usize,
    pub rejected_saturated: usize,
}

/// Threshold the frame at `scale` sigmas and filter the resulting components.
///
/// `saturation` is the pixel value at which the sensor clips, if known.
pub(crate) fn detect_candidates(
    pixels: &Buffer2<f32>,
    background: &Background,
    scale: f32,
    saturation: Option<f32>,
    config: &StarDetectionConfig,
) -> CandidatePass {
    let threshold = background.threshold(scale);
    let mask = pixels.map(|&v| v > threshold);
    let pixels_above_threshold = mask.iter().filter(|&&m| m).count();

    let (labels, count) = connected_components(&mask, config.connectivity);
    let components = extract_components(pixels, &labels, count, saturation);

    let mut pass = CandidatePass {
        pixels_above_threshold,
        connected_components: count,
        ..Default::default()
    };

    let width = pixels.width();
    let height = pixels.height();
    let margin = config.edge_margin;

    for candidate in components {
        if candidate.area < config.min_area {
            pass.rejected_small += 1;
        } else if candidate.x_min < margin
            || candidate.y_min < margin
            || candidate.x_max + margin >= width
            || candidate.y_max + margin >= height
        {
            pass.rejected_edge += 1;
        } else if candidate.area > config.max_area {
            pass.rejected_large += 1;
        } else if candidate.saturated > config.max_saturated_pixels {
            pass.rejected_saturated += 1;
        } else {
            pass.candidates.push(candidate);
        }
    }

    pass
}

/// Collect per-label statistics. Label `n` ends up at index `n - 1`.
fn extract_components(
    pixels: &Buffer2<f32>,
    labels: &Buffer2<u32>,
    count: usize,
    saturation: Option<f32>,
) -> Vec<Candidate> {
    let mut components: Vec<Option<Candidate>> = vec![None; count];

    for (y, row) in labels.rows().enumerate() {
        for (x, &label) in row.iter().enumerate() {
            if label == 0 {
                continue;
            }
            let value = pixels[(x, y)];
            let saturated = saturation.is_some_and(|s| value >= s);
            components[(label - 1) as usize]
                .get_or_insert_with(|| Candidate::new(x, y, value))
                .add(x, y, value, saturated);
        }
    }

    components.into_iter().flatten().collect()
}

// ============================================================================
// Connected components
// ============================================================================

/// Connected component labeling using union-find.
///
/// Two-pass algorithm: provisional labels with union-find on a forward scan,
/// then every label is replaced by its compacted root. Background is 0 and
/// components are numbered from 1 in order of their first pixel.
pub(crate) fn connected_components(
    mask: &Buffer2<bool>,
    connectivity: Connectivity,
) -> (Buffer2<u32>, usize) {
    let mut labels = Buffer2::new_filled(mask.width(), mask.height(), 0u32);
    let mut parent: Vec<u32> = Vec::new();

    assign_provisional_labels(mask, connectivity, &mut labels, &mut parent);

    if parent.is_empty() {
        return (labels, 0);
    }

    let mut root_to_final = vec![0u32; parent.len() + 1];
    let mut num_labels = 0u32;
    for label in 1..=parent.len() as u32 {
        let root = find(&mut parent, label);
        if root_to_final[root as usize] == 0 {
            num_labels += 1;
            root_to_final[root as usize] = num_labels;
        }
    }

    for label in labels.pixels_mut() {
        if *label != 0 {
            let root = find(&mut parent, *label);
            *label = root_to_final[root as usize];
        }
    }

    (labels, num_labels as usize)
}

/// First pass: assign provisional labels, merging labels that meet.
///
/// Only already-visited neighbors are inspected: left and up for
/// 4-connectivity, plus both upper diagonals for 8-connectivity.
fn assign_provisional_labels(
    mask: &Buffer2<bool>,
    connectivity: Connectivity,
    labels: &mut Buffer2<u32>,
    parent: &mut Vec<u32>,
) {
    let width = mask.width();
    let height = mask.height();

    let offsets: &[(i64, i64)] = match connectivity {
        Connectivity::Four => &[(-1, 0), (0, -1)],
        Connectivity::Eight => &[(-1, 0), (-1, -1), (0, -1), (1, -1)],
    };

    for y in 0..height {
        for x in 0..width {
            if !mask[(x, y)] {
                continue;
            }

            let mut current = 0u32;
            for &(dx, dy) in offsets {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if !mask.get_checked(nx, ny).copied().unwrap_or(false) {
                    continue;
                }
                let neighbor = labels[(nx as usize, ny as usize)];
                if current == 0 {
                    current = neighbor;
                } else if neighbor != current {
                    union(parent, current, neighbor);
                    current = current.min(neighbor);
                }
            }

            if current == 0 {
                parent.push(parent.len() as u32 + 1);
                current = parent.len() as u32;
            }
            labels[(x, y)] = current;
        }
    }
}

/// Find root of a label with path compression.
fn find(parent: &mut [u32], label: u32) -> u32 {
    let mut root = label;
    while parent[(root - 1) as usize] != root {
        root = parent[(root - 1) as usize];
    }

    let mut current = label;
    while current != root {
        let next = parent[(current - 1) as usize];
        parent[(current - 1) as usize] = root;
        current = next;
    }
    root
}

/// Union two labels; the smaller root wins.
fn union(parent: &mut [u32], a: u32, b: u32) {
    let root_a = find(parent, a);
    let root_b = find(parent, b);
    if root_a < root_b {
        parent[(root_b - 1) as usize] = root_a;
    } else if root_b < root_a {
        parent[(root_a - 1) as usize] = root_b;
    }
}
