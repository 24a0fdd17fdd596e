//! Statistical functions: median, MAD, sigma-clipped statistics.


/// MAD (Median Absolute Deviation) to standard deviation conversion factor.
///
/// For a normal distribution, σ ≈ 1.4826 × MAD.
pub const MAD_TO_SIGMA: f32 = 1.4826022;

/// Convert MAD to standard deviation (assuming normal distribution).
#[inline]
pub fn mad_to_sigma(mad: f32) -> f32 {
    mad * MAD_TO_SIGMA
}

/// Replaces each value with |value - median|.
#[inline]
fn abs_deviation_inplace(values: &mut [f32], median: f32) {
    for v in values.iter_mut() {
        *v = (*v - median).abs();
    }
}

/// Calculate the median of f32 values in-place.
///
/// Mutates the input buffer (partial sort via quickselect). Returns NaN for an
/// empty slice. Callers filter NaN beforehand; `total_cmp` keeps the ordering
/// well defined regardless.
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    if data.is_empty() {
        return f32::NAN;
    }

    let len = data.len();
    let mid = len / 2;
    let (left_part, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *median;

    if len & 1 == 1 {
        upper
    } else {
        let lower = left_part.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (lower + upper) * 0.5
    }
}

/// Upper-middle element, no averaging. Good enough inside clipping loops.
#[inline]
fn median_f32_approx(data: &mut [f32]) -> f32 {
    debug_assert!(!data.is_empty());

    let mid = data.len() / 2;
    let (_, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}

/// Compute median and MAD together. Mutates the input buffer.
pub fn median_and_mad_f32_mut(data: &mut [f32]) -> (f32, f32) {
    if data.is_empty() {
        return (f32::NAN, f32::NAN);
    }

    let median = median_f32_mut(data);
    abs_deviation_inplace(data, median);
    let mad = median_f32_mut(data);

    (median, mad)
}

/// Compute sigma-clipped median and MAD-based sigma.
///
/// Iteratively rejects values further than `kappa × sigma` from the median.
/// `deviations` is scratch space reused between calls.
///
/// # Returns
/// Tuple of (median, sigma) after clipping; `(0.0, 0.0)` for empty input.
pub fn sigma_clipped_median_mad(
    values: &mut [f32],
    deviations: &mut Vec<f32>,
    kappa: f32,
    iterations: usize,
) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let mut len = values.len();
    deviations.resize(len, 0.0);

    for _ in 0..iterations {
        if len < 3 {
            break;
        }

        let active = &mut values[..len];
        let median = median_f32_approx(active);

        deviations[..len].copy_from_slice(active);
        abs_deviation_inplace(&mut deviations[..len], median);
        let sigma = mad_to_sigma(median_f32_approx(&mut deviations[..len]));

        if sigma < f32::EPSILON {
            return (median, 0.0);
        }

        // Deviations were reordered by the selection above, so recompute per value.
        let threshold = kappa * sigma;
        let mut write_idx = 0;
        for i in 0..len {
            if (values[i] - median).abs() <= threshold {
                values[write_idx] = values[i];
                write_idx += 1;
            }
        }

        if write_idx == len {
            return (median, sigma);
        }
        len = write_idx;
    }

    let (median, mad) = median_and_mad_f32_mut(&mut values[..len]);
    (median, mad_to_sigma(mad))
}
