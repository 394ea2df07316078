// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoder for the UKSOFT2000/UView image format written by Elmitec
//! LEEM/PEEM acquisition systems.
//!
//! A file holds a 16 bit grayscale plane stored bottom-up, preceded by a
//! file header, an optional recipe region and an image header with an
//! attached tag stream of instrument readings.
//!
//! ```no_run
//! let mut f = uview_parser::filesystem::open_file("scan.dat").unwrap();
//! let image = uview_parser::from_stream(&mut f.file, f.size, "scan.dat").unwrap();
//! println!("{}x{} px, start voltage {} V", image.width(), image.height(), image.metadata.start_voltage);
//! let plane = image.read_plane(&mut f.file).unwrap();
//! ```

pub mod filesystem;
pub mod tags;
pub mod util;
pub mod uview;

pub use uview::{ Averaging, DataOffsets, DecodeError, LeemMetadata, ScanNote, UView, UViewImage };

use std::io::{ Read, Seek };

/// Detects and decodes one image from `stream`. `size` is the total stream
/// length in bytes; `filename` feeds the extension check and may be empty
/// for anonymous streams.
pub fn from_stream<T: Read + Seek>(stream: &mut T, size: usize, filename: &str) -> Result<UViewImage, DecodeError> {
    let buf = util::read_beginning(stream, size, 64)?;
    let mut uview = UView::detect(&buf, filename).ok_or(DecodeError::UnrecognizedFormat)?;
    uview.parse(stream, size)
}
