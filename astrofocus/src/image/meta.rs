//! Acquisition metadata carried alongside pixel data.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Arcseconds per radian divided by 1000 (µm pixel size over mm focal length).
const ARCSEC_PER_MICRON_PER_MM: f32 = 206.264_8;

/// Order in which rows of the pixel buffer map onto the sky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum RowOrder {
    /// First stored row is the top of the frame.
    #[default]
    TopDown,
    /// First stored row is the bottom of the frame (FITS convention).
    BottomUp,
}

impl RowOrder {
    pub fn fits_value(self) -> &'static str {
        match self {
            RowOrder::TopDown => "TOP-DOWN",
            RowOrder::BottomUp => "BOTTOM-UP",
        }
    }

    pub fn from_fits_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TOP-DOWN" => Some(RowOrder::TopDown),
            "BOTTOM-UP" => Some(RowOrder::BottomUp),
            _ => None,
        }
    }
}

/// Colour layout of the sensor that produced the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SensorType {
    #[default]
    Monochrome,
    /// Already-debayered colour data.
    Color,
    /// Raw Bayer mosaic, RGGB at the declared Bayer offset.
    Rggb,
}

impl SensorType {
    pub fn fits_value(self) -> &'static str {
        match self {
            SensorType::Monochrome => "MONOCHROME",
            SensorType::Color => "COLOR",
            SensorType::Rggb => "RGGB",
        }
    }

    pub fn from_fits_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MONOCHROME" | "MONO" => Some(SensorType::Monochrome),
            "COLOR" | "COLOUR" | "RGB" => Some(SensorType::Color),
            "RGGB" => Some(SensorType::Rggb),
            _ => None,
        }
    }

    /// True for raw colour-filter-array data.
    pub fn is_cfa(self) -> bool {
        matches!(self, SensorType::Rggb)
    }
}

/// Metadata describing how a frame was acquired.
///
/// Unknown floating point quantities are NaN, an unknown focuser position is `-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMeta {
    pub instrument: String,
    pub telescope: String,
    pub exposure_start: DateTime<Utc>,
    pub exposure_duration: Duration,
    pub filter: String,
    /// Pixel width in micrometres.
    pub pixel_size_x: f32,
    /// Pixel height in micrometres.
    pub pixel_size_y: f32,
    /// Focal length in millimetres.
    pub focal_length: f32,
    pub focus_position: i32,
    pub bin_x: u32,
    pub bin_y: u32,
    /// Sensor temperature in °C.
    pub ccd_temperature: f32,
    pub sensor_type: SensorType,
    pub bayer_offset_x: u32,
    pub bayer_offset_y: u32,
    pub row_order: RowOrder,
}

impl Default for ImageMeta {
    fn default() -> Self {
        Self {
            instrument: String::new(),
            telescope: String::new(),
            exposure_start: DateTime::<Utc>::UNIX_EPOCH,
            exposure_duration: Duration::ZERO,
            filter: String::new(),
            pixel_size_x: f32::NAN,
            pixel_size_y: f32::NAN,
            focal_length: f32::NAN,
            focus_position: -1,
            bin_x: 1,
            bin_y: 1,
            ccd_temperature: f32::NAN,
            sensor_type: SensorType::Monochrome,
            bayer_offset_x: 0,
            bayer_offset_y: 0,
            row_order: RowOrder::TopDown,
        }
    }
}

impl ImageMeta {
    /// Image scale in arcseconds per (binned) pixel along X, NaN when unknown.
    pub fn pixel_scale_arcsec(&self) -> f32 {
        if !(self.focal_length > 0.0) {
            return f32::NAN;
        }
        ARCSEC_PER_MICRON_PER_MM * self.pixel_size_x * self.bin_x as f32 / self.focal_length
    }

    /// Field-wise equality that treats floats bitwise, so NaN placeholders compare equal.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        let floats = |m: &Self| {
            [
                m.pixel_size_x,
                m.pixel_size_y,
                m.focal_length,
                m.ccd_temperature,
            ]
            .map(f32::to_bits)
        };
        self.instrument == other.instrument
            && self.telescope == other.telescope
            && self.exposure_start == other.exposure_start
            && self.exposure_duration == other.exposure_duration
            && self.filter == other.filter
            && floats(self) == floats(other)
            && self.focus_position == other.focus_position
            && self.bin_x == other.bin_x
            && self.bin_y == other.bin_y
            && self.sensor_type == other.sensor_type
            && self.bayer_offset_x == other.bayer_offset_x
            && self.bayer_offset_y == other.bayer_offset_y
            && self.row_order == other.row_order
    }
}
