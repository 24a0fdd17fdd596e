//! Error types for image decoding, encoding and ingestion.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading, writing or building an [`Image`](super::Image).
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Missing mandatory FITS keyword {keyword}")]
    MissingKeyword { keyword: &'static str },

    #[error("Invalid value for FITS keyword {keyword}: '{value}'")]
    InvalidKeyword { keyword: String, value: String },

    #[error("FITS keyword {keyword} cannot hold '{value}': only printable ASCII without trailing blanks")]
    UnrepresentableText { keyword: String, value: String },

    #[error("Header ended without an END card")]
    UnterminatedHeader,

    #[error("Unsupported BITPIX {0}")]
    UnsupportedBitDepth(i64),

    #[error("Unsupported axis layout: NAXIS = {naxis}")]
    UnsupportedAxes { naxis: i64 },

    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Data block truncated: expected {expected} bytes, got {actual}")]
    TruncatedData { expected: usize, actual: usize },

    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Pixel value {value} at index {index} is outside the {bit_depth} range")]
    ValueOutOfRange {
        index: usize,
        value: f32,
        bit_depth: &'static str,
    },
}

impl ImageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(keyword: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidKeyword {
            keyword: keyword.into(),
            value: value.into(),
        }
    }
}
