//! Numeric building blocks shared by detection and focusing.

pub mod accumulator;
pub mod statistics;

pub use accumulator::Accumulator;
pub use statistics::{
    MAD_TO_SIGMA, mad_to_sigma, median_and_mad_f32_mut, median_f32_mut, sigma_clipped_median_mad,
};
