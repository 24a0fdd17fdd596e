//! Ingestion of raw camera readout buffers.

use common::buffer2::Buffer2;

use super::{BitDepth, Image, ImageError, ImageMeta};

/// Order in which the camera emits samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// `height` rows of `width` samples.
    RowMajor,
    /// `width` columns of `height` samples.
    ColumnMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Layout and byte order of a camera buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSourceFormat {
    pub layout: SourceLayout,
    pub endian: Endianness,
}

impl ImageSourceFormat {
    pub const ROW_MAJOR_LE: Self = Self::new(SourceLayout::RowMajor, Endianness::Little);
    pub const ROW_MAJOR_BE: Self = Self::new(SourceLayout::RowMajor, Endianness::Big);
    pub const COLUMN_MAJOR_LE: Self = Self::new(SourceLayout::ColumnMajor, Endianness::Little);
    pub const COLUMN_MAJOR_BE: Self = Self::new(SourceLayout::ColumnMajor, Endianness::Big);

    pub const fn new(layout: SourceLayout, endian: Endianness) -> Self {
        Self { layout, endian }
    }
}

/// Reads one sample. Integer depths below 64 bits are unsigned camera counts.
fn read_sample(bytes: &[u8], bit_depth: BitDepth, endian: Endianness) -> f64 {
    macro_rules! decode {
        ($ty:ty, $n:literal) => {{
            let mut raw = [0u8; $n];
            raw.copy_from_slice(&bytes[..$n]);
            match endian {
                Endianness::Little => <$ty>::from_le_bytes(raw) as f64,
                Endianness::Big => <$ty>::from_be_bytes(raw) as f64,
            }
        }};
    }

    match bit_depth {
        BitDepth::Int8 => bytes[0] as f64,
        BitDepth::Int16 => decode!(u16, 2),
        BitDepth::Int32 => decode!(u32, 4),
        BitDepth::Int64 => decode!(i64, 8),
        BitDepth::Float32 => decode!(f32, 4),
        BitDepth::Float64 => decode!(f64, 8),
    }
}

impl Image {
    /// Builds an image from a camera readout, subtracting the black level.
    ///
    /// Each output pixel is `max(sample - black_level, 0)`; the bit depth is kept.
    pub fn from_camera_buffer(
        data: &[u8],
        format: ImageSourceFormat,
        width: usize,
        height: usize,
        bit_depth: BitDepth,
        black_level: u32,
        meta: ImageMeta,
    ) -> Result<Image, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidDimensions { width, height });
        }

        let sample_size = bit_depth.bytes_per_pixel();
        let expected = bit_depth
            .plane_bytes(width, height)
            .ok_or(ImageError::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(ImageError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let black = black_level as f64;
        let mut pixels = Buffer2::new_default(width, height);
        for (i, sample) in data.chunks_exact(sample_size).enumerate() {
            let (x, y) = match format.layout {
                SourceLayout::RowMajor => (i % width, i / width),
                SourceLayout::ColumnMajor => (i / height, i % height),
            };
            let value = read_sample(sample, bit_depth, format.endian);
            pixels[(x, y)] = (value - black).max(0.0) as f32;
        }

        tracing::debug!(
            width,
            height,
            bit_depth = bit_depth.name(),
            black_level,
            "converted camera buffer"
        );

        Image::new(pixels, bit_depth, black_level as f32, meta)
    }
}
