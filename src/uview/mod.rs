// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod header;
pub mod leem;

use std::io::*;
use byteorder::{ ReadBytesExt, LittleEndian };
use serde::Serialize;
use thiserror::Error;

use crate::tags::GroupedTagMap;
use crate::util;
pub use header::{ FileHeader, HeaderLayout, ImageHeader, MAGIC, MAGIC_2001 };
pub use leem::{ Averaging, LeemMetadata, ScanNote };

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a UKSOFT2000/UView file")]
    UnrecognizedFormat,
    #[error("file ends inside the {region}")]
    TruncatedHeader { region: &'static str },
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    #[error("tag stream ended mid record after {consumed} accounted bytes")]
    CorruptTagStream { consumed: usize },
    #[error("pixel data offset {offset} outside the {file_len} byte file")]
    OffsetOutOfRange { offset: i64, file_len: u64 },
    #[error("pixel data ends inside source row {row}")]
    TruncatedPlane { row: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Start of the pixel plane, resolved two independent ways. Writers disagree
/// with their own headers often enough that only the file length is trusted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DataOffsets {
    /// Authoritative: file length minus the 16 bit pixel payload.
    pub from_file_length: u64,
    /// Diagnostic: sum of the declared header regions.
    pub from_headers: u64,
}

impl DataOffsets {
    pub(crate) fn resolve(file_header: &FileHeader, image_header: &ImageHeader, file_len: u64) -> std::result::Result<Self, DecodeError> {
        let payload = 2 * file_header.width as i64 * file_header.height as i64;
        let offset = file_len as i64 - payload;
        if offset < 0 || offset > file_len as i64 {
            return Err(DecodeError::OffsetOutOfRange { offset, file_len });
        }
        let from_headers = file_header.header_size as u64
            + file_header.recipe_size() as u64
            + image_header.size as u64
            + image_header.markup_block() as u64;
        Ok(Self { from_file_length: offset as u64, from_headers })
    }

    pub fn divergence(&self) -> i64 {
        self.from_file_length as i64 - self.from_headers as i64
    }
}

/// One decoded file: every header region, the accumulated metadata and the
/// resolved pixel offsets. Pixel rows are read on demand through
/// [`read_plane`](UViewImage::read_plane).
#[derive(Debug)]
pub struct UViewImage {
    pub file_header: FileHeader,
    pub recipe: Option<Vec<u8>>,
    pub image_header: ImageHeader,
    pub metadata: LeemMetadata,
    pub tag_map: GroupedTagMap,
    pub scan_notes: Vec<ScanNote>,
    /// Set when the tag stream died mid record. Everything decoded before the
    /// failure is kept.
    pub tag_stream_error: Option<DecodeError>,
    pub offsets: DataOffsets,
}

impl UViewImage {
    pub fn width(&self) -> usize { self.file_header.width as usize }
    pub fn height(&self) -> usize { self.file_header.height as usize }
    pub fn bits_per_pixel(&self) -> u16 { self.file_header.bits_per_pixel }

    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.metadata.timestamp()
    }

    /// Attached recipe as text, cut at the first NUL. The region is
    /// fixed-size and padded with whatever the writer had in memory.
    pub fn recipe_str(&self) -> Option<String> {
        self.recipe.as_ref().map(|r| {
            let end = memchr::memchr(0, r).unwrap_or(r.len());
            String::from_utf8_lossy(&r[..end]).into_owned()
        })
    }

    /// Reads the pixel plane, flipping it to top-down row order.
    pub fn read_plane<T: Read + Seek>(&self, stream: &mut T) -> std::result::Result<Vec<u16>, DecodeError> {
        let mut plane = vec![0u16; self.width() * self.height()];
        self.read_plane_into(stream, &mut plane)?;
        Ok(plane)
    }

    /// As [`read_plane`](UViewImage::read_plane) but into a caller buffer of
    /// exactly `width * height` values. The buffer contents are unspecified
    /// on error.
    pub fn read_plane_into<T: Read + Seek>(&self, stream: &mut T, plane: &mut [u16]) -> std::result::Result<(), DecodeError> {
        let (w, h) = (self.width(), self.height());
        if plane.len() != w * h {
            return Err(DecodeError::Io(ErrorKind::InvalidInput.into()));
        }
        stream.seek(SeekFrom::Start(self.offsets.from_file_length))?;
        // Stored bottom-up, like a BMP. Source row r lands in output row h-1-r.
        for r in 0..h {
            let row = &mut plane[(h - 1 - r) * w..(h - r) * w];
            stream.read_u16_into::<LittleEndian>(row).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof { DecodeError::TruncatedPlane { row: r } } else { DecodeError::Io(e) }
            })?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct UView {
    /// Digits following the UKSOFT magic, "2001" on current writers.
    pub magic_revision: Option<String>,
}

impl UView {
    /// Checks `buffer` against the first `prefix_len` bytes of the newest
    /// magic. Old writers only guarantee the UKSOFT part.
    pub fn matches_magic(buffer: &[u8], prefix_len: usize) -> bool {
        buffer.len() >= prefix_len && buffer[..prefix_len] == MAGIC_2001[..prefix_len]
    }

    pub fn possible_extensions() -> Vec<&'static str> { vec!["dat"] }

    pub fn format_name(&self) -> &'static str { "UKSOFT2000/UView" }

    /// `buffer` holds the beginning of the stream. A `.dat` suffix is
    /// required whenever a non-empty `filepath` is given, but never suffices
    /// on its own.
    pub fn detect<P: AsRef<std::path::Path>>(buffer: &[u8], filepath: P) -> Option<Self> {
        let path = filepath.as_ref().to_str().unwrap_or_default();
        if !path.is_empty() && crate::filesystem::get_extension(path) != "dat" {
            return None;
        }
        if Self::matches_magic(buffer, MAGIC.len()) {
            let magic_revision = buffer.get(MAGIC.len()..MAGIC_2001.len()).map(|b| String::from_utf8_lossy(b).into_owned());
            Some(Self { magic_revision })
        } else {
            None
        }
    }

    pub fn parse<T: Read + Seek>(&mut self, stream: &mut T, size: usize) -> std::result::Result<UViewImage, DecodeError> {
        let file_header = FileHeader::read(stream)?;
        let recipe = read_recipe(stream, &file_header)?;
        let image_header_offset = file_header.header_size as u64 + file_header.recipe_size() as u64;
        let image_header = ImageHeader::read(stream, image_header_offset)?;

        let mut metadata = LeemMetadata::default();
        let mut tag_map = GroupedTagMap::new();
        let mut scan_notes = Vec::new();
        let mut tag_stream_error = None;
        if image_header.version > 4 {
            if image_header.time_raw > 0 {
                metadata.unix_timestamp = util::filetime_to_unix(image_header.time_raw);
            }
            let start = image_header_offset + leem::LEEM_DATA_OFFSET;
            match leem::scan(stream, start, image_header.leem_data_version, &mut metadata, &mut tag_map, &mut scan_notes) {
                Ok(()) => { }
                Err(e @ DecodeError::CorruptTagStream { .. }) => {
                    // Keep whatever the stream yielded up to the failure.
                    log::warn!("Tag stream error: {}", e);
                    tag_stream_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        for note in &scan_notes {
            log::debug!("Tag stream note: {}", note);
        }

        let offsets = DataOffsets::resolve(&file_header, &image_header, size as u64)?;
        if offsets.divergence() != 0 {
            log::debug!("Pixel offset mismatch: {} from file length, {} from headers", offsets.from_file_length, offsets.from_headers);
        }

        Ok(UViewImage {
            file_header,
            recipe,
            image_header,
            metadata,
            tag_map,
            scan_notes,
            tag_stream_error,
            offsets,
        })
    }
}

fn read_recipe<T: Read + Seek>(stream: &mut T, header: &FileHeader) -> std::result::Result<Option<Vec<u8>>, DecodeError> {
    let size = header.recipe_size();
    if size == 0 {
        return Ok(None);
    }
    stream.seek(SeekFrom::Start(header.header_size as u64))?;
    let mut buf = vec![0u8; size as usize];
    stream.read_exact(&mut buf).map_err(header::eof_as_truncated("recipe"))?;
    Ok(Some(buf))
}
