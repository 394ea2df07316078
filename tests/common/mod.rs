// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synthetic UKSOFT2000/UView files assembled byte by byte.

use std::io::Cursor;

pub fn put_u16(buf: &mut Vec<u8>, offset: usize, v: u16) {
    pad_to(buf, offset + 2);
    buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

fn pad_to(buf: &mut Vec<u8>, len: usize) {
    if buf.len() < len {
        buf.resize(len, 0);
    }
}

/// Builder for one complete file. Defaults describe a small current-format
/// image: file header v8, image header v6, an empty tag stream and a 2x2
/// pixel plane placed so the whole file is 400 bytes.
pub struct UviewFile {
    pub version: u16,
    pub header_size: u16,
    pub bits_per_pixel: u16,
    pub width: u16,
    pub height: u16,
    pub image_count: u16,
    /// Lie about the recipe length instead of using `recipe.len()`.
    pub declared_recipe_size: Option<u16>,
    pub recipe: Vec<u8>,
    pub ih_version: u16,
    pub ih_size: u16,
    pub time_raw: i64,
    pub markup_size: u16,
    pub spin: u16,
    pub leem_data_version: u16,
    pub tags: Vec<u8>,
    /// Filler between the tag stream and the pixel plane.
    pub pad_to_data: usize,
    pub pixels: Vec<u16>,
}

impl Default for UviewFile {
    fn default() -> Self {
        Self {
            version: 8,
            header_size: 104,
            bits_per_pixel: 16,
            width: 2,
            height: 2,
            image_count: 1,
            declared_recipe_size: None,
            recipe: Vec::new(),
            ih_version: 6,
            ih_size: 288,
            time_raw: 0,
            markup_size: 0,
            spin: 0,
            leem_data_version: 2,
            tags: vec![255],
            pad_to_data: 259,
            pixels: vec![1, 2, 3, 4],
        }
    }
}

impl UviewFile {
    pub fn bytes(&self) -> Vec<u8> {
        let recipe_size = self.declared_recipe_size.unwrap_or(self.recipe.len() as u16);

        let mut buf = b"UKSOFT2001".to_vec();
        put_u16(&mut buf, 20, self.header_size);
        put_u16(&mut buf, 22, self.version);
        put_u16(&mut buf, 24, self.bits_per_pixel);
        put_u16(&mut buf, 40, self.width);
        put_u16(&mut buf, 42, self.height);
        put_u16(&mut buf, 44, self.image_count);
        if self.version > 7 {
            put_u16(&mut buf, 46, 12); // camera bits per pixel
            put_u16(&mut buf, 48, 40); // MCP diameter
            pad_to(&mut buf, 52);
            buf[50] = 1; // h binning
            buf[51] = 1; // v binning
            put_u16(&mut buf, 52, recipe_size);
        } else if self.version == 7 {
            put_u16(&mut buf, 46, recipe_size);
        }
        pad_to(&mut buf, self.header_size as usize);
        buf.extend_from_slice(&self.recipe);

        let base = self.header_size as usize + self.recipe.len();
        put_u16(&mut buf, base, self.ih_size);
        put_u16(&mut buf, base + 2, self.ih_version);
        put_u16(&mut buf, base + 4, 0); // color low
        put_u16(&mut buf, base + 6, 4095); // color high
        pad_to(&mut buf, base + 16);
        buf[base + 8..base + 16].copy_from_slice(&self.time_raw.to_le_bytes());
        put_u16(&mut buf, base + 16, 0); // mask x
        put_u16(&mut buf, base + 18, 0); // mask y
        if self.ih_version > 4 {
            put_u16(&mut buf, base + 20, self.markup_size);
            put_u16(&mut buf, base + 22, self.spin);
            put_u16(&mut buf, base + 24, self.leem_data_version);
        } else {
            put_u16(&mut buf, base + 20, self.spin);
            put_u16(&mut buf, base + 22, self.leem_data_version);
        }

        pad_to(&mut buf, base + 28);
        buf.extend_from_slice(&self.tags);
        let pad = buf.len() + self.pad_to_data;
        pad_to(&mut buf, pad);
        for px in &self.pixels {
            buf.extend_from_slice(&px.to_le_bytes());
        }
        buf
    }

    pub fn cursor(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes())
    }
}

pub fn cstr(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}
