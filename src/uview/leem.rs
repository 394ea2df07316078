// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::*;
use byteorder::{ ReadBytesExt, LittleEndian };
use serde::Serialize;

use crate::tag;
use crate::tags::*;
use crate::util::insert_tag;
use super::DecodeError;

/// The tag stream starts this many bytes past the start of the image header
/// region (26 declared bytes plus 2 reserved).
pub const LEEM_DATA_OFFSET: u64 = 28;
/// Hard cap on the accounted record bytes. Scanning stops once the counter
/// reaches this, terminator or not.
pub const TAG_BUDGET: usize = 256;
pub const END_TAG: u8 = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Averaging {
    #[default]
    Off,
    Sliding,
    Frames(u8),
}
impl std::fmt::Display for Averaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Averaging::Off => f.write_str("off"),
            Averaging::Sliding => f.write_str("sliding average"),
            Averaging::Frames(n) => f.write_fmt(format_args!("{} frames", n)),
        }
    }
}

/// Fields accumulated from the tag stream. Everything keeps its default until
/// a record explicitly sets it, so a partially readable stream still yields a
/// usable value.
#[derive(Debug, Clone, Serialize)]
pub struct LeemMetadata {
    /// Reserved for callers, nothing here consumes it.
    pub start_voltage: f32,
    pub temperature: f32,
    pub azimuth: f32,
    pub pressure: f32,
    /// Seconds since the Unix epoch, 0.0 when the file carries no usable time.
    pub unix_timestamp: f64,
    pub micrometer_x: Option<f32>,
    pub micrometer_y: Option<f32>,
    /// Camera exposure in seconds.
    pub exposure: Option<f32>,
    pub averaging: Averaging,
}

impl Default for LeemMetadata {
    fn default() -> Self {
        Self {
            start_voltage: 0.0,
            temperature: 25.0,
            azimuth: 360.0,
            pressure: 0.0,
            unix_timestamp: 0.0,
            micrometer_x: None,
            micrometer_y: None,
            exposure: None,
            averaging: Averaging::Off,
        }
    }
}

impl LeemMetadata {
    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        if self.unix_timestamp == 0.0 {
            return None;
        }
        let secs = self.unix_timestamp.floor();
        chrono::DateTime::from_timestamp(secs as i64, ((self.unix_timestamp - secs) * 1e9) as u32)
    }
}

/// One diagnostic collected while walking the tag stream.
#[derive(Debug, Clone, Serialize)]
pub struct ScanNote {
    pub tag: Option<u8>,
    /// Value of the byte-budget counter when the note was recorded.
    pub budget_used: usize,
    pub message: String,
}
impl std::fmt::Display for ScanNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tag {
            Some(tag) => f.write_fmt(format_args!("tag {} at budget {}: {}", tag, self.budget_used, self.message)),
            None => f.write_fmt(format_args!("at budget {}: {}", self.budget_used, self.message)),
        }
    }
}

/// Walks the tag stream at `start`, filling `meta` and `map` record by record.
/// Never logs; diagnostics land in `notes` for the caller to report.
pub(crate) fn scan<T: Read + Seek>(
    stream: &mut T,
    start: u64,
    leem_data_version: u16,
    meta: &mut LeemMetadata,
    map: &mut GroupedTagMap,
    notes: &mut Vec<ScanNote>,
) -> std::result::Result<(), DecodeError> {
    stream.seek(SeekFrom::Start(start)).map_err(DecodeError::Io)?;

    let mut budget = 0usize;
    match scan_records(stream, leem_data_version, &mut budget, meta, map, notes) {
        Ok(true) => Ok(()),
        Ok(false) => {
            // Tolerated truncation: the stream simply never produced tag 255.
            notes.push(ScanNote { tag: None, budget_used: budget, message: "byte budget exhausted before the end marker".into() });
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(DecodeError::CorruptTagStream { consumed: budget }),
        Err(e) => Err(DecodeError::Io(e)),
    }
}

fn scan_records<T: Read + Seek>(
    stream: &mut T,
    leem_data_version: u16,
    i: &mut usize,
    meta: &mut LeemMetadata,
    map: &mut GroupedTagMap,
    notes: &mut Vec<ScanNote>,
) -> Result<bool> {
    while *i < TAG_BUDGET {
        let tag = stream.read_u8()?;
        *i += 1;
        match tag {
            END_TAG => return Ok(true),
            16 => {
                // Padding byte. The historical accounting charges one extra
                // unit here and every later decoder kept it.
                stream.read_u8()?;
                *i += 2;
            }
            100 => {
                let x = stream.read_f32::<LittleEndian>()?;
                let y = stream.read_f32::<LittleEndian>()?;
                *i += 8;
                meta.micrometer_x = Some(x);
                meta.micrometer_y = Some(y);
                insert_tag(map, tag!(native tag, GroupId::Position, TagId::StageX, "Stage X", f32, x));
                insert_tag(map, tag!(native tag, GroupId::Position, TagId::StageY, "Stage Y", f32, y));
            }
            101 => {
                // Terminator byte deliberately not charged to the budget.
                let (fov, n) = read_cstr(stream, TAG_BUDGET.saturating_sub(*i))?;
                *i += n;
                insert_tag(map, tag!(native tag, GroupId::Image, TagId::FieldOfView, "Field of view", String, fov));
            }
            102 | 103 => {
                let v = stream.read_f32::<LittleEndian>()?;
                *i += 4;
                insert_tag(map, tag!(native tag, GroupId::Instrument, TagId::Unknown(tag), "Reserved channel", f32, v));
            }
            104 => {
                let v = stream.read_f32::<LittleEndian>()?;
                *i += 4;
                meta.exposure = Some(v);
                insert_tag(map, tag!(native tag, GroupId::Camera, TagId::Exposure, "Camera exposure", f32, v));
                if leem_data_version > 1 {
                    // Two trailing bytes, not charged to the budget.
                    let mode = stream.read_i8()?;
                    let _reserved = stream.read_i8()?;
                    meta.averaging = match mode {
                        m if m < 0 => Averaging::Sliding,
                        0 => Averaging::Off,
                        m => Averaging::Frames(m as u8),
                    };
                    insert_tag(map, tag!(native tag, GroupId::Camera, TagId::Averaging, "Frame averaging", String, meta.averaging.to_string()));
                }
            }
            105 => {
                let (title, n) = read_cstr(stream, TAG_BUDGET.saturating_sub(*i))?;
                *i += n;
                insert_tag(map, tag!(native tag, GroupId::Image, TagId::Title, "Image title", String, title));
            }
            106..=109 => {
                let (name, n) = read_cstr(stream, TAG_BUDGET.saturating_sub(*i))?;
                let (units, _) = read_cstr(stream, TAG_BUDGET.saturating_sub(*i))?;
                let value = stream.read_f32::<LittleEndian>()?;
                // Historical accounting: the name is charged twice and the
                // units not at all.
                *i += n * 2 + 4;
                if tag == 106 {
                    meta.pressure = value;
                }
                insert_tag(map, tag!(native tag, GroupId::Gauge, TagId::Custom(name.clone()), "Pressure gauge", Gauge, GaugeReading { name, units, value }));
            }
            110 => {
                let (label, n) = read_cstr(stream, TAG_BUDGET.saturating_sub(*i))?;
                let v = stream.read_f32::<LittleEndian>()?;
                *i += n + 4;
                insert_tag(map, tag!(native tag, GroupId::Image, TagId::FieldOfViewCal, "Field of view calibration", String, format!("{} = {}", label, v)));
            }
            111 => {
                let phi = stream.read_f32::<LittleEndian>()?;
                let theta = stream.read_f32::<LittleEndian>()?;
                *i += 8;
                insert_tag(map, tag!(native tag, GroupId::Position, TagId::Phi, "Sample tilt phi", f32, phi));
                insert_tag(map, tag!(native tag, GroupId::Position, TagId::Theta, "Sample tilt theta", f32, theta));
            }
            115 => {
                let v = stream.read_f32::<LittleEndian>()?;
                *i += 4;
                insert_tag(map, tag!(native tag, GroupId::Camera, TagId::McpScreen, "MCP screen voltage", f32, v));
            }
            116 => {
                let v = stream.read_f32::<LittleEndian>()?;
                *i += 4;
                insert_tag(map, tag!(native tag, GroupId::Camera, TagId::McpChannelPlate, "MCP channel plate voltage", f32, v));
            }
            t if t > 128 => read_module(stream, t - 128, i, meta, map)?,
            t if t < 100 => read_module(stream, t, i, meta, map)?,
            _ => {
                // Reserved range. Only the tag byte itself advances the
                // budget, so the cap still guarantees termination.
                notes.push(ScanNote { tag: Some(tag), budget_used: *i, message: "unhandled reserved tag".into() });
            }
        }
    }
    Ok(false)
}

/// Shared fallback for the open-ended tag range: a labeled instrument reading,
/// one string and one float. Well known labels feed the metadata fields.
fn read_module<T: Read + Seek>(stream: &mut T, native: u8, i: &mut usize, meta: &mut LeemMetadata, map: &mut GroupedTagMap) -> Result<()> {
    let (label, n) = read_cstr(stream, TAG_BUDGET.saturating_sub(*i))?;
    let value = stream.read_f32::<LittleEndian>()?;
    *i += n + 4;

    if label.starts_with("Start Voltage") {
        meta.start_voltage = value;
    } else if label.starts_with("Sample Temp") {
        meta.temperature = value;
    } else if label.starts_with("Azimuth") {
        meta.azimuth = value;
    }

    insert_tag(map, tag!(native native, GroupId::Instrument, TagId::Custom(label), "Instrument reading", f32, value));
    Ok(())
}

/// NUL terminated string, reading at most `max` bytes. Returns the text and
/// the byte count before the terminator; the terminator is consumed but not
/// counted. Hitting `max` first leaves the string unterminated.
fn read_cstr<T: Read>(stream: &mut T, max: usize) -> Result<(String, usize)> {
    let mut bytes = Vec::new();
    while bytes.len() < max {
        let b = stream.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    let n = bytes.len();
    Ok((String::from_utf8_lossy(&bytes).into_owned(), n))
}
