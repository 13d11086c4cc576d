/* Copyright (C) 2024 by Sam Rodgers
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
 * THE SOFTWARE.
 */

//! RGB565 pixel codec and the LCD image pipeline.
//!
//! The keyboard's screen is 162x173 and takes RGB565 pixels serialized
//! big-endian. Images are oriented for the panel before packing: resize,
//! vertical flip, then a 90 degree clockwise rotation.

// ----- Crates -----

use crate::ProtocolError;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use std::path::Path;

// ----- Constants -----

/// LCD panel logical width
pub const IMAGE_WIDTH: u32 = 162;
/// LCD panel logical height
pub const IMAGE_HEIGHT: u32 = 173;
/// Serialized image stream length: W * H * 2 bytes per RGB565 pixel
pub const IMAGE_BYTES: usize = (IMAGE_WIDTH * IMAGE_HEIGHT * 2) as usize;

/// Raster formats accepted by [`prepare_image`], by file extension
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

// ----- Functions -----

/// Pack an 8-bit RGB triple into RGB565
///
/// # Remarks
/// `rrrrrggggggbbbbb`, high bit first. The low bits of each channel are
/// masked off; the round trip through [`unpack_rgb565`] is lossy by up to
/// 8 per channel.
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r & 0xF8) << 8) | (u16::from(g & 0xFC) << 3) | (u16::from(b & 0xF8) >> 3)
}

/// Unpack RGB565 into an 8-bit RGB triple
///
/// # Remarks
/// The top bits of each channel are replicated into the vacated low bits, so
/// full-scale values decode to full scale rather than sitting 3 LSB dark.
pub fn unpack_rgb565(pixel: u16) -> (u8, u8, u8) {
    let mut r = ((pixel & 0xF800) >> 8) as u8;
    let mut g = ((pixel & 0x07E0) >> 3) as u8;
    let mut b = ((pixel & 0x001F) << 3) as u8;

    r |= r >> 5;
    g |= g >> 6;
    b |= b >> 5;

    (r, g, b)
}

/// Serialize 16-bit words big-endian, high byte first
///
/// The screen interprets pixel data high byte first; a little-endian split
/// garbles every colour on the panel.
pub fn split_u16_be(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

/// Decode an image file and produce the 56052-byte panel stream
///
/// # Arguments
/// * `path` - any common raster format (see [`SUPPORTED_EXTENSIONS`])
///
/// # Remarks
/// Decode, resize to 162x173, orient for the panel, pack to RGB565,
/// serialize big-endian.
pub fn prepare_image(path: &Path) -> Result<Vec<u8>, ProtocolError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ProtocolError::UnsupportedFormat(extension));
    }

    let image = image::open(path).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    pack_image(&image)
}

/// Orient and pack an already-decoded image
///
/// # Remarks
/// The orientation order (flip vertical, then rotate 90 clockwise) is what
/// the panel firmware expects; swapping the two steps mirrors the picture.
pub fn pack_image(image: &DynamicImage) -> Result<Vec<u8>, ProtocolError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ProtocolError::Decode("image has zero dimensions".to_string()));
    }

    let resized = image
        .resize_exact(IMAGE_WIDTH, IMAGE_HEIGHT, FilterType::Triangle)
        .to_rgb8();
    let flipped = imageops::flip_vertical(&resized);
    // rotate90 is clockwise; the result is 173 wide by 162 tall
    let oriented = imageops::rotate90(&flipped);

    let mut words = Vec::with_capacity((IMAGE_WIDTH * IMAGE_HEIGHT) as usize);
    for pixel in oriented.pixels() {
        let [r, g, b] = pixel.0;
        words.push(pack_rgb565(r, g, b));
    }

    Ok(split_u16_be(&words))
}
