//! FITS primary-HDU codec.
//!
//! Header: 80-byte ASCII cards in 2880-byte blocks, closed by `END`.
//! Data: big-endian samples in buffer order, zero-padded to a block boundary.
//! Integer 16/32-bit frames use the BZERO unsigned convention when no pixel is
//! negative. Every metadata float is written with its shortest round-trip
//! representation and the exposure duration as an exact decimal, so
//! `write` followed by `read` reproduces the frame bit for bit.
//!
//! Strings longer than one card use the `CONTINUE` long-string convention.
//! Text FITS cannot hold (non-ASCII, control characters, trailing blanks) is
//! refused by the writer rather than altered.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::buffer2::Buffer2;

use super::{BitDepth, Image, ImageError, ImageMeta, RowOrder, SensorType};

pub(crate) const BLOCK_SIZE: usize = 2880;
pub(crate) const CARD_SIZE: usize = 80;
/// Characters between the quotes of one card, after escaping.
const MAX_STRING_LEN: usize = 68;
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

pub(crate) mod keys {
    pub const SIMPLE: &str = "SIMPLE";
    pub const BITPIX: &str = "BITPIX";
    pub const NAXIS: &str = "NAXIS";
    pub const NAXIS1: &str = "NAXIS1";
    pub const NAXIS2: &str = "NAXIS2";
    pub const NAXIS3: &str = "NAXIS3";
    pub const BZERO: &str = "BZERO";
    pub const BSCALE: &str = "BSCALE";
    pub const INSTRUME: &str = "INSTRUME";
    pub const TELESCOP: &str = "TELESCOP";
    pub const DATE_OBS: &str = "DATE-OBS";
    pub const EXPTIME: &str = "EXPTIME";
    pub const EXPOSURE: &str = "EXPOSURE";
    pub const FILTER: &str = "FILTER";
    pub const XPIXSZ: &str = "XPIXSZ";
    pub const YPIXSZ: &str = "YPIXSZ";
    pub const FOCALLEN: &str = "FOCALLEN";
    pub const FOCUSPOS: &str = "FOCUSPOS";
    pub const XBINNING: &str = "XBINNING";
    pub const YBINNING: &str = "YBINNING";
    pub const CCD_TEMP: &str = "CCD-TEMP";
    pub const SENSTYPE: &str = "SENSTYPE";
    pub const BAYERPAT: &str = "BAYERPAT";
    pub const XBAYROFF: &str = "XBAYROFF";
    pub const YBAYROFF: &str = "YBAYROFF";
    pub const ROWORDER: &str = "ROWORDER";
    pub const BLKLEVEL: &str = "BLKLEVEL";
    pub const CONTINUE: &str = "CONTINUE";
    pub const END: &str = "END";
}

// ============================================================================
// Header cards
// ============================================================================

/// Value part of a parsed card. Non-string values keep their raw token and
/// are interpreted by the typed getters.
#[derive(Debug, Clone, PartialEq)]
enum CardValue {
    Text(String),
    Token(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Card {
    keyword: String,
    value: CardValue,
}

/// Parsed header in file order.
#[derive(Debug, Default)]
pub(crate) struct Header {
    cards: Vec<Card>,
}

impl Header {
    fn find(&self, keyword: &str) -> Option<&CardValue> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| &c.value)
    }

    fn token(&self, keyword: &str) -> Option<&str> {
        match self.find(keyword)? {
            CardValue::Token(t) => Some(t.as_str()),
            CardValue::Text(t) => Some(t.trim()),
        }
    }

    pub(crate) fn text(&self, keyword: &str) -> Option<&str> {
        match self.find(keyword)? {
            CardValue::Text(t) => Some(t.as_str()),
            CardValue::Token(t) => Some(t.as_str()),
        }
    }

    pub(crate) fn int(&self, keyword: &str) -> Result<Option<i64>, ImageError> {
        let Some(token) = self.token(keyword) else {
            return Ok(None);
        };
        if let Ok(v) = token.parse::<i64>() {
            return Ok(Some(v));
        }
        // Some writers emit integral keys as "2.0".
        match parse_float(token) {
            Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(Some(v as i64)),
            _ => Err(ImageError::invalid(keyword, token)),
        }
    }

    pub(crate) fn float(&self, keyword: &str) -> Result<Option<f64>, ImageError> {
        match self.token(keyword) {
            None => Ok(None),
            Some(token) => parse_float(token)
                .map(Some)
                .ok_or_else(|| ImageError::invalid(keyword, token)),
        }
    }

    /// Single precision parse straight from the text, so the shortest
    /// representation written by [`format_f32`] maps back to the same bits.
    fn float32(&self, keyword: &str) -> Result<Option<f32>, ImageError> {
        match self.token(keyword) {
            None => Ok(None),
            Some(token) => token
                .replace(['D', 'd'], "E")
                .parse::<f32>()
                .map(Some)
                .map_err(|_| ImageError::invalid(keyword, token)),
        }
    }

    fn logical(&self, keyword: &str) -> Option<bool> {
        match self.token(keyword)? {
            "T" => Some(true),
            "F" => Some(false),
            _ => None,
        }
    }

    fn require_int(&self, keyword: &'static str) -> Result<i64, ImageError> {
        self.int(keyword)?
            .ok_or(ImageError::MissingKeyword { keyword })
    }
}

fn parse_float(token: &str) -> Option<f64> {
    token.replace(['D', 'd'], "E").parse::<f64>().ok()
}

/// Splits one 80-byte record into keyword and value.
///
/// Returns `None` for commentary cards (`COMMENT`, `HISTORY`, blank, or
/// anything without the `= ` value indicator).
fn parse_card(record: &[u8]) -> Option<Card> {
    let text = String::from_utf8_lossy(record);
    let keyword = text.get(..8).unwrap_or(&text).trim_end().to_string();
    if text.get(8..10) != Some("= ") {
        return None;
    }
    let rest = text.get(10..).unwrap_or("").trim_start();

    let value = if let Some(quoted) = rest.strip_prefix('\'') {
        CardValue::Text(unquote(quoted))
    } else {
        let token = rest.split('/').next().unwrap_or("").trim();
        CardValue::Token(token.to_string())
    };

    Some(Card { keyword, value })
}

/// Text after an opening quote, up to the closing one, with `''` unescaped.
fn unquote(quoted: &str) -> String {
    let mut out = String::new();
    let mut chars = quoted.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                out.push('\'');
                chars.next();
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    // Trailing blanks inside quotes are not significant.
    out.truncate(out.trim_end().len());
    out
}

/// Appends a `CONTINUE` record to the string it extends. The previous value
/// must end with the `&` continuation marker; otherwise the record is
/// commentary.
fn append_continuation(header: &mut Header, record: &[u8]) {
    let Some(Card {
        value: CardValue::Text(text),
        ..
    }) = header.cards.last_mut()
    else {
        return;
    };
    if !text.ends_with('&') {
        return;
    }
    let rest = String::from_utf8_lossy(&record[keys::CONTINUE.len()..]);
    if let Some(quoted) = rest.trim_start().strip_prefix('\'') {
        text.pop();
        text.push_str(&unquote(quoted));
    }
}

/// Reads header blocks up to and including the one holding `END`.
pub(crate) fn read_header<R: Read>(reader: &mut R) -> Result<Header, ImageError> {
    let mut header = Header::default();
    let mut block = [0u8; BLOCK_SIZE];
    let mut first_card = true;

    loop {
        if let Err(e) = reader.read_exact(&mut block) {
            return Err(if e.kind() == io::ErrorKind::UnexpectedEof {
                ImageError::UnterminatedHeader
            } else {
                ImageError::io("<header>", e)
            });
        }

        for record in block.chunks_exact(CARD_SIZE) {
            if first_card {
                first_card = false;
                if !record.starts_with(keys::SIMPLE.as_bytes()) {
                    return Err(ImageError::MissingKeyword {
                        keyword: keys::SIMPLE,
                    });
                }
            }
            if record.starts_with(b"END") && record[3..].iter().all(|&b| b == b' ') {
                return Ok(header);
            }
            if record.starts_with(keys::CONTINUE.as_bytes()) {
                append_continuation(&mut header, record);
            } else if let Some(card) = parse_card(record) {
                header.cards.push(card);
            }
        }
    }
}

/// Builds one 80-byte record. Numbers are right-justified to column 30,
/// strings start at column 11.
pub(crate) fn card(keyword: &str, value: &str) -> [u8; CARD_SIZE] {
    let mut record = [b' '; CARD_SIZE];
    let key = keyword.as_bytes();
    let key_len = key.len().min(8);
    record[..key_len].copy_from_slice(&key[..key_len]);

    if keyword == keys::END {
        return record;
    }
    if keyword != keys::CONTINUE {
        record[8] = b'=';
        record[9] = b' ';
    }
    let bytes = value.as_bytes();
    let start = if value.starts_with('\'') {
        10
    } else {
        30usize.saturating_sub(bytes.len()).max(10)
    };
    let len = bytes.len().min(CARD_SIZE - start);
    record[start..start + len].copy_from_slice(&bytes[..len]);
    record
}

/// Cards holding a string value, split over `CONTINUE` records when it does
/// not fit one card.
///
/// Fails for text the reader could not give back unchanged: anything outside
/// printable ASCII, or trailing blanks, which FITS treats as padding.
fn text_cards(keyword: &str, value: &str) -> Result<Vec<[u8; CARD_SIZE]>, ImageError> {
    let printable = value.bytes().all(|b| (b' '..=b'~').contains(&b));
    if !printable || value.ends_with(' ') {
        return Err(ImageError::UnrepresentableText {
            keyword: keyword.to_string(),
            value: value.to_string(),
        });
    }

    let escaped_len = |c: char| if c == '\'' { 2 } else { 1 };
    let mut cards = Vec::new();
    let mut rest = value;
    loop {
        let key = if cards.is_empty() { keyword } else { keys::CONTINUE };
        if rest.chars().map(escaped_len).sum::<usize>() <= MAX_STRING_LEN {
            let escaped = rest.replace('\'', "''");
            // The standard asks for at least 8 characters between the quotes.
            cards.push(card(key, &format!("'{escaped:<8}'")));
            return Ok(cards);
        }

        // Leave room for the `&` marker; escaped quotes stay in one piece.
        let mut used = 0;
        let mut split = 0;
        for (i, c) in rest.char_indices() {
            used += escaped_len(c);
            if used > MAX_STRING_LEN - 1 {
                break;
            }
            split = i + c.len_utf8();
        }
        let escaped = rest[..split].replace('\'', "''");
        cards.push(card(key, &format!("'{escaped}&'")));
        rest = &rest[split..];
    }
}

/// Shortest representation that parses back to the same `f32`, with a FITS exponent letter.
fn format_f32(value: f32) -> String {
    format!("{value:?}").to_ascii_uppercase()
}

/// Exact decimal seconds, e.g. `1.250000000`.
fn format_duration(duration: Duration) -> String {
    format!("{}.{:09}", duration.as_secs(), duration.subsec_nanos())
}

fn parse_duration(keyword: &str, token: &str) -> Result<Duration, ImageError> {
    let invalid = || ImageError::invalid(keyword, token);
    let plain = token.bytes().all(|b| b.is_ascii_digit() || b == b'.');
    if !plain {
        let seconds = parse_float(token).ok_or_else(invalid)?;
        return Duration::try_from_secs_f64(seconds).map_err(|_| invalid());
    }

    let (whole, frac) = token.split_once('.').unwrap_or((token, ""));
    let secs = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| invalid())?
    };
    let mut digits: String = frac.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos = digits.parse::<u32>().map_err(|_| invalid())?;
    Ok(Duration::new(secs, nanos))
}

fn parse_date(keyword: &str, text: &str) -> Result<DateTime<Utc>, ImageError> {
    let text = text.trim().trim_end_matches('Z');
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ImageError::invalid(keyword, text))
}

// ============================================================================
// Reading
// ============================================================================

pub(crate) fn read(path: &Path) -> Result<Image, ImageError> {
    let file = File::open(path).map_err(|e| ImageError::io(path, e))?;
    let mut reader = BufReader::new(file);
    decode(&mut reader).map_err(|e| match e {
        ImageError::Io { source, .. } => ImageError::io(path, source),
        other => other,
    })
}

/// Decodes a primary HDU from any byte stream.
pub(crate) fn decode<R: Read>(reader: &mut R) -> Result<Image, ImageError> {
    let header = read_header(reader)?;

    if header.logical(keys::SIMPLE) != Some(true) {
        return Err(ImageError::invalid(
            keys::SIMPLE,
            header.text(keys::SIMPLE).unwrap_or_default(),
        ));
    }

    let bitpix = header.require_int(keys::BITPIX)?;
    let bit_depth = BitDepth::from_fits_code(bitpix).ok_or(ImageError::UnsupportedBitDepth(bitpix))?;

    let naxis = header.require_int(keys::NAXIS)?;
    match naxis {
        2 => {}
        3 if header.int(keys::NAXIS3)? == Some(1) => {}
        _ => return Err(ImageError::UnsupportedAxes { naxis }),
    }

    let width = header.require_int(keys::NAXIS1)?;
    let height = header.require_int(keys::NAXIS2)?;
    let invalid_dimensions = || ImageError::InvalidDimensions {
        width: usize::try_from(width).unwrap_or(0),
        height: usize::try_from(height).unwrap_or(0),
    };
    let (Ok(width), Ok(height)) = (usize::try_from(width), usize::try_from(height)) else {
        return Err(invalid_dimensions());
    };
    if width == 0 || height == 0 {
        return Err(invalid_dimensions());
    }
    let expected = bit_depth
        .plane_bytes(width, height)
        .ok_or_else(invalid_dimensions)?;

    let bzero = header.float(keys::BZERO)?.unwrap_or(0.0);
    let bscale = header.float(keys::BSCALE)?.unwrap_or(1.0);

    // The header size is untrusted, so the buffer grows with the bytes
    // actually present instead of being reserved up front.
    let mut data = Vec::new();
    reader
        .by_ref()
        .take(expected as u64)
        .read_to_end(&mut data)
        .map_err(|e| ImageError::io("<data>", e))?;
    if data.len() < expected {
        return Err(ImageError::TruncatedData {
            expected,
            actual: data.len(),
        });
    }

    let pixels = decode_samples(&data, bit_depth, bzero, bscale);
    // Fractional BSCALE or an unusual BZERO leaves integer storage with
    // physical values outside its range; keep them as float data.
    let bit_depth = if bit_depth.first_out_of_range(&pixels).is_some() {
        tracing::debug!(bitpix, bzero, bscale, "scaled integer data decoded as float");
        BitDepth::Float32
    } else {
        bit_depth
    };
    let meta = decode_meta(&header)?;
    let black_level = header.float32(keys::BLKLEVEL)?.unwrap_or(0.0);

    tracing::debug!(
        width,
        height,
        bitpix,
        instrument = %meta.instrument,
        "decoded FITS frame"
    );

    Image::new(Buffer2::new(width, height, pixels), bit_depth, black_level, meta)
}

fn decode_samples(data: &[u8], bit_depth: BitDepth, bzero: f64, bscale: f64) -> Vec<f32> {
    let physical = |raw: f64| (raw * bscale + bzero) as f32;
    match bit_depth {
        BitDepth::Int8 => data.iter().map(|&b| physical(b as f64)).collect(),
        BitDepth::Int16 => data
            .chunks_exact(2)
            .map(|c| physical(i16::from_be_bytes([c[0], c[1]]) as f64))
            .collect(),
        BitDepth::Int32 => data
            .chunks_exact(4)
            .map(|c| physical(i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
        BitDepth::Int64 => data
            .chunks_exact(8)
            .map(|c| physical(i64::from_be_bytes(c.try_into().unwrap_or([0; 8])) as f64))
            .collect(),
        // Float data is physical already unless the header says otherwise.
        BitDepth::Float32 if bzero == 0.0 && bscale == 1.0 => data
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        BitDepth::Float32 => data
            .chunks_exact(4)
            .map(|c| physical(f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
        BitDepth::Float64 => data
            .chunks_exact(8)
            .map(|c| physical(f64::from_be_bytes(c.try_into().unwrap_or([0; 8]))))
            .collect(),
    }
}

fn decode_meta(header: &Header) -> Result<ImageMeta, ImageError> {
    let defaults = ImageMeta::default();

    let exposure_start = match header.text(keys::DATE_OBS) {
        Some(text) => parse_date(keys::DATE_OBS, text)?,
        None => defaults.exposure_start,
    };
    let exposure_duration = match header
        .token(keys::EXPTIME)
        .map(|t| (keys::EXPTIME, t))
        .or_else(|| header.token(keys::EXPOSURE).map(|t| (keys::EXPOSURE, t)))
    {
        Some((keyword, token)) => parse_duration(keyword, token)?,
        None => defaults.exposure_duration,
    };

    let sensor_type = match header.text(keys::SENSTYPE) {
        Some(text) => SensorType::from_fits_value(text)
            .ok_or_else(|| ImageError::invalid(keys::SENSTYPE, text))?,
        None if header.text(keys::BAYERPAT).is_some() => SensorType::Rggb,
        None => SensorType::Monochrome,
    };
    let row_order = match header.text(keys::ROWORDER) {
        Some(text) => RowOrder::from_fits_value(text)
            .ok_or_else(|| ImageError::invalid(keys::ROWORDER, text))?,
        None => RowOrder::TopDown,
    };

    let int_as = |keyword: &str, default: i64| -> Result<i64, ImageError> {
        Ok(header.int(keyword)?.unwrap_or(default))
    };
    let non_negative = |keyword: &str, default: u32| -> Result<u32, ImageError> {
        let value = int_as(keyword, default as i64)?;
        u32::try_from(value).map_err(|_| ImageError::invalid(keyword, value.to_string()))
    };
    let focus_position = int_as(keys::FOCUSPOS, defaults.focus_position as i64)?;

    Ok(ImageMeta {
        instrument: header.text(keys::INSTRUME).unwrap_or_default().to_string(),
        telescope: header.text(keys::TELESCOP).unwrap_or_default().to_string(),
        exposure_start,
        exposure_duration,
        filter: header.text(keys::FILTER).unwrap_or_default().to_string(),
        pixel_size_x: header.float32(keys::XPIXSZ)?.unwrap_or(f32::NAN),
        pixel_size_y: header.float32(keys::YPIXSZ)?.unwrap_or(f32::NAN),
        focal_length: header.float32(keys::FOCALLEN)?.unwrap_or(f32::NAN),
        focus_position: i32::try_from(focus_position)
            .map_err(|_| ImageError::invalid(keys::FOCUSPOS, focus_position.to_string()))?,
        bin_x: non_negative(keys::XBINNING, defaults.bin_x)?,
        bin_y: non_negative(keys::YBINNING, defaults.bin_y)?,
        ccd_temperature: header.float32(keys::CCD_TEMP)?.unwrap_or(f32::NAN),
        sensor_type,
        bayer_offset_x: non_negative(keys::XBAYROFF, 0)?,
        bayer_offset_y: non_negative(keys::YBAYROFF, 0)?,
        row_order,
    })
}

// ============================================================================
// Writing
// ============================================================================

/// Temporary sibling file that is deleted on drop unless renamed into place.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn for_target(target: &Path) -> Self {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: target.with_file_name(format!(".{name}.partial")),
            committed: false,
        }
    }

    fn commit(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

pub(crate) fn write(image: &Image, path: &Path) -> Result<(), ImageError> {
    // Refuse unrepresentable metadata before touching the file system.
    let cards = header_cards(image)?;
    let partial = PartialFile::for_target(path);
    let io_err = |e: io::Error| ImageError::io(path, e);

    {
        let file = File::create(&partial.path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        write_frame(image, &cards, &mut writer).map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
    }

    partial.commit(path).map_err(io_err)?;
    tracing::debug!(path = %path.display(), "wrote FITS frame");
    Ok(())
}

/// Serialises header and data blocks.
pub(crate) fn encode<W: Write>(image: &Image, writer: &mut W) -> Result<(), ImageError> {
    let cards = header_cards(image)?;
    write_frame(image, &cards, writer).map_err(|e| ImageError::io("<stream>", e))
}

/// BZERO applied to the stored integers, if the unsigned convention is used.
fn unsigned_offset(image: &Image) -> Option<f64> {
    image
        .bit_depth()
        .unsigned_offset()
        .filter(|_| image.pixels().iter().all(|&v| v >= 0.0))
}

fn header_cards(image: &Image) -> Result<Vec<[u8; CARD_SIZE]>, ImageError> {
    let bit_depth = image.bit_depth();
    let mut cards = Vec::with_capacity(32);
    cards.push(card(keys::SIMPLE, "T"));
    cards.push(card(keys::BITPIX, &bit_depth.fits_code().to_string()));
    cards.push(card(keys::NAXIS, "2"));
    cards.push(card(keys::NAXIS1, &image.width().to_string()));
    cards.push(card(keys::NAXIS2, &image.height().to_string()));
    if let Some(offset) = unsigned_offset(image) {
        cards.push(card(keys::BZERO, &format!("{offset:.0}")));
        cards.push(card(keys::BSCALE, "1"));
    }
    encode_meta(image.meta(), &mut cards)?;
    cards.push(card(keys::BLKLEVEL, &format_f32(image.black_level())));
    cards.push(card(keys::END, ""));
    Ok(cards)
}

fn write_frame<W: Write>(
    image: &Image,
    cards: &[[u8; CARD_SIZE]],
    writer: &mut W,
) -> io::Result<()> {
    for record in cards {
        writer.write_all(record)?;
    }
    write_padding(writer, cards.len() * CARD_SIZE, b' ')?;

    let bit_depth = image.bit_depth();
    let row_bytes = image.width() * bit_depth.bytes_per_pixel();
    let mut row = Vec::with_capacity(row_bytes);
    let offset = unsigned_offset(image).unwrap_or(0.0);
    for source in image.pixels().rows() {
        row.clear();
        encode_row(source, bit_depth, offset, &mut row);
        writer.write_all(&row)?;
    }
    write_padding(writer, row_bytes * image.height(), 0)?;
    writer.flush()
}

fn encode_meta(meta: &ImageMeta, cards: &mut Vec<[u8; CARD_SIZE]>) -> Result<(), ImageError> {
    for (keyword, value) in [
        (keys::INSTRUME, meta.instrument.as_str()),
        (keys::TELESCOP, meta.telescope.as_str()),
        (keys::FILTER, meta.filter.as_str()),
    ] {
        if !value.is_empty() {
            cards.extend(text_cards(keyword, value)?);
        }
    }

    let date = meta.exposure_start.format(DATE_FORMAT).to_string();
    cards.extend(text_cards(keys::DATE_OBS, &date)?);
    cards.push(card(keys::EXPTIME, &format_duration(meta.exposure_duration)));

    for (keyword, value) in [
        (keys::XPIXSZ, meta.pixel_size_x),
        (keys::YPIXSZ, meta.pixel_size_y),
        (keys::FOCALLEN, meta.focal_length),
        (keys::CCD_TEMP, meta.ccd_temperature),
    ] {
        // NaN has no FITS spelling; a missing card reads back as NaN.
        if !value.is_nan() {
            cards.push(card(keyword, &format_f32(value)));
        }
    }

    cards.push(card(keys::FOCUSPOS, &meta.focus_position.to_string()));
    cards.push(card(keys::XBINNING, &meta.bin_x.to_string()));
    cards.push(card(keys::YBINNING, &meta.bin_y.to_string()));
    cards.extend(text_cards(keys::SENSTYPE, meta.sensor_type.fits_value())?);
    if meta.sensor_type.is_cfa() {
        cards.extend(text_cards(keys::BAYERPAT, meta.sensor_type.fits_value())?);
    }
    cards.push(card(keys::XBAYROFF, &meta.bayer_offset_x.to_string()));
    cards.push(card(keys::YBAYROFF, &meta.bayer_offset_y.to_string()));
    cards.extend(text_cards(keys::ROWORDER, meta.row_order.fits_value())?);
    Ok(())
}

fn encode_row(source: &[f32], bit_depth: BitDepth, offset: f64, out: &mut Vec<u8>) {
    match bit_depth {
        BitDepth::Int8 => out.extend(source.iter().map(|&v| v as u8)),
        BitDepth::Int16 => {
            for &v in source {
                out.extend_from_slice(&((v as f64 - offset) as i16).to_be_bytes());
            }
        }
        BitDepth::Int32 => {
            for &v in source {
                out.extend_from_slice(&((v as f64 - offset) as i32).to_be_bytes());
            }
        }
        BitDepth::Int64 => {
            for &v in source {
                out.extend_from_slice(&(v as i64).to_be_bytes());
            }
        }
        BitDepth::Float32 => {
            for &v in source {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        BitDepth::Float64 => {
            for &v in source {
                out.extend_from_slice(&(v as f64).to_be_bytes());
            }
        }
    }
}

fn write_padding<W: Write>(writer: &mut W, written: usize, fill: u8) -> io::Result<()> {
    let remainder = written % BLOCK_SIZE;
    if remainder != 0 {
        writer.write_all(&vec![fill; BLOCK_SIZE - remainder])?;
    }
    Ok(())
}
