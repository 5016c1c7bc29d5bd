//! Raster image buffer plus thin PNG codec and crop adapters

use crate::{Error, Result};
use crate::session::CropArea;
use std::io::Cursor;

/// Bytes per RGBA pixel
pub const PIXEL_BYTES: usize = 4;

/// A decoded raster image: row-major RGBA bytes
///
/// The invariant `data.len() == width * height * 4` holds for every value
/// produced by this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RasterImage {
    /// Wrap an existing RGBA buffer, rejecting length mismatches
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * PIXEL_BYTES;
        if data.len() != expected {
            return Err(Error::Codec(format!(
                "buffer length {} does not match {}x{} RGBA",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A fully transparent image of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * PIXEL_BYTES],
        }
    }

    pub fn row_len(&self) -> usize {
        self.width as usize * PIXEL_BYTES
    }

    /// The pixel bytes of one row
    pub fn row(&self, index: usize) -> &[u8] {
        let len = self.row_len();
        &self.data[index * len..(index + 1) * len]
    }

    /// Strict equality: height, then width, then every byte
    pub fn matches(&self, other: &Self) -> bool {
        self.height == other.height && self.width == other.width && self.data == other.data
    }
}

/// Decode PNG bytes into an RGBA raster buffer
pub fn decode(bytes: &[u8]) -> Result<RasterImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::Codec(format!("PNG decode failed: {}", e)))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    Ok(RasterImage {
        width,
        height,
        data: rgba.into_raw(),
    })
}

/// Encode an RGBA raster buffer as PNG bytes
pub fn encode(image: &RasterImage) -> Result<Vec<u8>> {
    let buffer: image::RgbaImage =
        image::ImageBuffer::from_raw(image.width, image.height, image.data.clone())
            .ok_or_else(|| Error::Codec("RGBA buffer does not match dimensions".to_string()))?;
    let mut out = Vec::new();
    buffer
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| Error::Codec(format!("PNG encode failed: {}", e)))?;
    Ok(out)
}

/// Decode a raw screenshot and crop it to the harness-reported bounding box
///
/// The box is clamped to the screenshot bounds; a box that starts outside the
/// screenshot is rejected.
pub fn crop(bytes: &[u8], area: &CropArea) -> Result<RasterImage> {
    let full = decode(bytes)?;
    if area.left >= full.width || area.top >= full.height {
        return Err(Error::Codec(format!(
            "crop origin ({}, {}) lies outside {}x{} screenshot",
            area.left, area.top, full.width, full.height
        )));
    }
    let width = area.width.min(full.width - area.left);
    let height = area.height.min(full.height - area.top);

    let row_len = width as usize * PIXEL_BYTES;
    let mut data = Vec::with_capacity(row_len * height as usize);
    for y in area.top..area.top + height {
        let row = full.row(y as usize);
        let start = area.left as usize * PIXEL_BYTES;
        data.extend_from_slice(&row[start..start + row_len]);
    }
    Ok(RasterImage {
        width,
        height,
        data,
    })
}
