// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::*;
use byteorder::{ ReadBytesExt, LittleEndian };
use serde::Serialize;

use super::DecodeError;

/// Magic prefix shared by every known revision of the acquisition software.
pub const MAGIC: &[u8] = b"UKSOFT";
/// Full magic written by the newest revision.
pub const MAGIC_2001: &[u8] = b"UKSOFT2001";

pub(crate) fn eof_as_truncated(region: &'static str) -> impl Fn(Error) -> DecodeError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            DecodeError::TruncatedHeader { region }
        } else {
            DecodeError::Io(e)
        }
    }
}

/// Fields present only in some file header revisions, selected once by `version`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HeaderLayout {
    /// version <= 6, no extension fields
    Classic,
    /// version == 7 appends the attached recipe size
    Recipe { recipe_size: u16 },
    /// version >= 8 appends camera parameters before the recipe size
    Camera {
        camera_bits_per_pixel: u16,
        mcp_diameter: u16,
        h_binning: u8,
        v_binning: u8,
        recipe_size: u16,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileHeader {
    pub header_size: u16,
    pub version: u16,
    pub bits_per_pixel: u16,
    pub width: u16,
    pub height: u16,
    pub image_count: u16,
    pub layout: HeaderLayout,
}

impl FileHeader {
    pub fn read<T: Read + Seek>(stream: &mut T) -> std::result::Result<FileHeader, DecodeError> {
        let trunc = eof_as_truncated("file header");

        // Fixed slots stable across all revisions, then the 26..40 reserved gap.
        stream.seek(SeekFrom::Start(20))?;
        let header_size    = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let version        = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let bits_per_pixel = stream.read_u16::<LittleEndian>().map_err(&trunc)?;

        stream.seek(SeekFrom::Start(40))?;
        let width       = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let height      = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let image_count = stream.read_u16::<LittleEndian>().map_err(&trunc)?;

        let layout = if version > 7 {
            let camera_bits_per_pixel = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
            let mcp_diameter          = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
            let h_binning             = stream.read_u8().map_err(&trunc)?;
            let v_binning             = stream.read_u8().map_err(&trunc)?;
            let recipe_size           = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
            HeaderLayout::Camera { camera_bits_per_pixel, mcp_diameter, h_binning, v_binning, recipe_size }
        } else if version > 6 {
            let recipe_size = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
            HeaderLayout::Recipe { recipe_size }
        } else {
            HeaderLayout::Classic
        };

        let header = FileHeader { header_size, version, bits_per_pixel, width, height, image_count, layout };

        if header.width == 0 || header.height == 0 {
            return Err(DecodeError::MalformedHeader(format!("image dimensions {}x{}", header.width, header.height)));
        }
        if (header.header_size as u64) < header.layout_bytes() {
            return Err(DecodeError::MalformedHeader(format!("declared header size {} smaller than the {} byte v{} layout", header.header_size, header.layout_bytes(), header.version)));
        }

        Ok(header)
    }

    pub fn recipe_size(&self) -> u16 {
        match self.layout {
            HeaderLayout::Classic => 0,
            HeaderLayout::Recipe { recipe_size } => recipe_size,
            HeaderLayout::Camera { recipe_size, .. } => recipe_size,
        }
    }

    /// Bytes the selected layout occupies from the start of the file.
    pub fn layout_bytes(&self) -> u64 {
        match self.layout {
            HeaderLayout::Classic => 46,
            HeaderLayout::Recipe { .. } => 48,
            HeaderLayout::Camera { .. } => 54,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageHeader {
    pub size: u16,
    pub version: u16,
    pub color_low: u16,
    pub color_high: u16,
    /// Windows FILETIME of the acquisition.
    pub time_raw: i64,
    pub mask_x: u16,
    pub mask_y: u16,
    /// 0 when the field is absent (version <= 4).
    pub markup_size: u16,
    pub spin: u16,
    pub leem_data_version: u16,
}

impl ImageHeader {
    pub fn read<T: Read + Seek>(stream: &mut T, offset: u64) -> std::result::Result<ImageHeader, DecodeError> {
        let trunc = eof_as_truncated("image header");

        stream.seek(SeekFrom::Start(offset))?;
        let size       = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let version    = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let color_low  = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let color_high = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let time_raw   = stream.read_i64::<LittleEndian>().map_err(&trunc)?;
        let mask_x     = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let mask_y     = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let markup_size = if version > 4 { stream.read_u16::<LittleEndian>().map_err(&trunc)? } else { 0 };
        let spin              = stream.read_u16::<LittleEndian>().map_err(&trunc)?;
        let leem_data_version = stream.read_u16::<LittleEndian>().map_err(&trunc)?;

        let header = ImageHeader { size, version, color_low, color_high, time_raw, mask_x, mask_y, markup_size, spin, leem_data_version };

        let consumed: u16 = if version > 4 { 26 } else { 24 };
        if header.size < consumed {
            return Err(DecodeError::MalformedHeader(format!("declared image header size {} smaller than the {} byte v{} layout", header.size, consumed, header.version)));
        }

        Ok(header)
    }

    /// Size of the markup region between the image header and the pixel data.
    /// The region always rounds up to the next 128 byte boundary, 128 even when
    /// no markup is attached.
    pub fn markup_block(&self) -> u32 {
        128 * (self.markup_size as u32 / 128 + 1)
    }

    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        crate::util::filetime_to_datetime(self.time_raw)
    }
}
