//! Image model: pixel buffer, bit depth and acquisition metadata.

mod convert;
pub mod error;
pub(crate) mod fits;
mod meta;


use std::path::Path;

use common::buffer2::Buffer2;
use common::file_utils::{FITS_EXTENSIONS, has_extension};

pub use convert::{Endianness, ImageSourceFormat, SourceLayout};
pub use error::ImageError;
pub use meta::{ImageMeta, RowOrder, SensorType};

/// Pixel storage type, identified by its FITS `BITPIX` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl BitDepth {
    pub fn from_fits_code(code: i64) -> Option<Self> {
        match code {
            8 => Some(BitDepth::Int8),
            16 => Some(BitDepth::Int16),
            32 => Some(BitDepth::Int32),
            64 => Some(BitDepth::Int64),
            -32 => Some(BitDepth::Float32),
            -64 => Some(BitDepth::Float64),
            _ => None,
        }
    }

    pub fn fits_code(self) -> i64 {
        match self {
            BitDepth::Int8 => 8,
            BitDepth::Int16 => 16,
            BitDepth::Int32 => 32,
            BitDepth::Int64 => 64,
            BitDepth::Float32 => -32,
            BitDepth::Float64 => -64,
        }
    }

    /// Bytes per stored element.
    pub fn bytes_per_pixel(self) -> usize {
        (self.fits_code().unsigned_abs() / 8) as usize
    }

    pub fn is_integer(self) -> bool {
        self.fits_code() > 0
    }

    /// Size of a `width` x `height` data plane in bytes, `None` on overflow.
    pub fn plane_bytes(self, width: usize, height: usize) -> Option<usize> {
        width
            .checked_mul(height)?
            .checked_mul(self.bytes_per_pixel())
    }

    pub fn name(self) -> &'static str {
        match self {
            BitDepth::Int8 => "8-bit",
            BitDepth::Int16 => "16-bit",
            BitDepth::Int32 => "32-bit",
            BitDepth::Int64 => "64-bit",
            BitDepth::Float32 => "32-bit float",
            BitDepth::Float64 => "64-bit float",
        }
    }

    /// Value at which an integer sensor clips, `None` for float data.
    pub fn saturation_value(self) -> Option<f32> {
        match self {
            BitDepth::Int8 => Some(u8::MAX as f32),
            BitDepth::Int16 => Some(u16::MAX as f32),
            BitDepth::Int32 => Some(u32::MAX as f32),
            BitDepth::Int64 => Some(i64::MAX as f32),
            BitDepth::Float32 | BitDepth::Float64 => None,
        }
    }

    /// Offset that maps the unsigned range onto the signed storage type.
    pub(crate) fn unsigned_offset(self) -> Option<f64> {
        match self {
            BitDepth::Int16 => Some(32768.0),
            BitDepth::Int32 => Some(2147483648.0),
            _ => None,
        }
    }

    /// Inclusive value range of the storage type.
    ///
    /// 16 and 32-bit data is either unsigned (stored with a BZERO offset)
    /// or signed, so the range depends on whether negative values occur.
    fn value_range(self, has_negative: bool) -> (f32, f32) {
        match (self, has_negative) {
            (BitDepth::Int8, _) => (0.0, u8::MAX as f32),
            (BitDepth::Int16, false) => (0.0, u16::MAX as f32),
            (BitDepth::Int16, true) => (i16::MIN as f32, i16::MAX as f32),
            (BitDepth::Int32, false) => (0.0, u32::MAX as f32),
            (BitDepth::Int32, true) => (i32::MIN as f32, i32::MAX as f32),
            (BitDepth::Int64, _) => (i64::MIN as f32, i64::MAX as f32),
            (BitDepth::Float32 | BitDepth::Float64, _) => (f32::NEG_INFINITY, f32::INFINITY),
        }
    }

    /// First value this depth cannot store, with its index. Integer depths
    /// need finite integral values inside [`Self::value_range`].
    pub(crate) fn first_out_of_range(self, values: &[f32]) -> Option<(usize, f32)> {
        if !self.is_integer() {
            return None;
        }
        let mut has_negative = false;
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() || value.fract() != 0.0 {
                return Some((index, value));
            }
            has_negative |= value < 0.0;
        }
        let (lo, hi) = self.value_range(has_negative);
        values
            .iter()
            .enumerate()
            .find(|&(_, &v)| v < lo || v > hi)
            .map(|(index, &value)| (index, value))
    }
}

/// A single-channel frame.
///
/// Pixels are stored row-major in a [`Buffer2`]; [`ImageMeta::row_order`] says
/// whether the first row is the top or the bottom of the frame.
///
/// Samples are held as `f32` whatever the bit depth. 64-bit float samples and
/// integers beyond 2^24 in magnitude are rounded to the nearest `f32`, so
/// `16_777_217` is stored as `16_777_216.0`.
#[derive(Debug, Clone)]
pub struct Image {
    pixels: Buffer2<f32>,
    bit_depth: BitDepth,
    black_level: f32,
    max_value: f32,
    meta: ImageMeta,
}

impl Image {
    /// Wraps a pixel buffer, checking that every value is representable in `bit_depth`.
    pub fn new(
        pixels: Buffer2<f32>,
        bit_depth: BitDepth,
        black_level: f32,
        meta: ImageMeta,
    ) -> Result<Self, ImageError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ImageError::InvalidDimensions {
                width: pixels.width(),
                height: pixels.height(),
            });
        }

        if let Some((index, value)) = bit_depth.first_out_of_range(&pixels) {
            return Err(ImageError::ValueOutOfRange {
                index,
                value,
                bit_depth: bit_depth.name(),
            });
        }

        // f32::max ignores NaN, so blank float pixels never become the maximum.
        let max = pixels.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Ok(Self {
            pixels,
            bit_depth,
            black_level,
            max_value: if max == f32::NEG_INFINITY { f32::NAN } else { max },
            meta,
        })
    }

    /// Loads a frame, dispatching on the file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path = path.as_ref();
        if has_extension(path, FITS_EXTENSIONS) {
            return Self::read_fits(path);
        }
        Err(ImageError::UnsupportedFormat {
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    /// Decodes a FITS primary HDU.
    pub fn read_fits<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        fits::read(path.as_ref())
    }

    /// Encodes the frame as FITS. Either the whole file is written or nothing is.
    pub fn write_fits<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        fits::write(self, path.as_ref())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    #[inline]
    pub fn pixels(&self) -> &Buffer2<f32> {
        &self.pixels
    }

    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    #[inline]
    pub fn black_level(&self) -> f32 {
        self.black_level
    }

    /// Largest pixel value in the buffer.
    #[inline]
    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    #[inline]
    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    /// Replaces the metadata; pixel invariants are unaffected.
    pub fn with_meta(mut self, meta: ImageMeta) -> Self {
        self.meta = meta;
        self
    }
}
