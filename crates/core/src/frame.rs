//! Frame and Image Encoding Helpers
//!
//! Captured camera frames travel to the planner as base64-encoded PNG, and the
//! planner's highlight image comes back the same way. This module owns both
//! directions of that conversion.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::warn;

/// Errors raised while turning a raw frame into PNG bytes.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// A raw RGBA32 still frame as produced by the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Encodes the frame as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let expected = self.width as usize * self.height as usize * 4;
        let image = RgbaImage::from_raw(self.width, self.height, self.rgba.clone()).ok_or(
            ImageError::BufferSize {
                width: self.width,
                height: self.height,
                expected,
                actual: self.rgba.len(),
            },
        )?;

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}

/// A decoded image returned by the planner, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightImage {
    /// The bytes exactly as the server sent them (PNG or JPEG).
    pub encoded: Vec<u8>,
    pub format: ImageFormat,
    pub pixels: RgbaImage,
}

impl HighlightImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// File extension matching the encoded bytes.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes base64, tolerating surrounding whitespace and a `data:<mime>;base64,` prefix.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(strip_data_url_prefix(data.trim()))
}

fn strip_data_url_prefix(data: &str) -> &str {
    if data
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        if let Some((_, payload)) = data.split_once(',') {
            return payload;
        }
    }
    data
}

/// Turns the optional `highlight_image_base64` field into an image.
///
/// Missing, empty or undecodable payloads all yield `None`; a broken highlight
/// image never fails the request that carried it.
pub fn decode_highlight(data: Option<&str>) -> Option<HighlightImage> {
    let data = match data {
        Some(d) if !d.trim().is_empty() => d,
        _ => {
            warn!("Highlight image is missing or empty.");
            return None;
        }
    };

    let encoded = match decode_base64(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Highlight image is not valid base64.");
            return None;
        }
    };

    let format = match image::guess_format(&encoded) {
        Ok(format) => format,
        Err(e) => {
            warn!(error = %e, "Failed to recognise highlight image format.");
            return None;
        }
    };

    match image::load_from_memory_with_format(&encoded, format) {
        Ok(decoded) => Some(HighlightImage {
            pixels: decoded.to_rgba8(),
            format,
            encoded,
        }),
        Err(e) => {
            warn!(error = %e, "Failed to load highlight image from base64.");
            None
        }
    }
}
