use std::path::Path;

use image::RgbImage;

pub const UNKNOWN_EXTENSION: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Empty upload")]
    Empty,
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Image has no pixels ({0}x{1})")]
    ZeroSized(u32, u32),
}

/// Decodes any supported format and converts it to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let image = image::load_from_memory(bytes)?.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::ZeroSized(image.width(), image.height()));
    }
    Ok(image)
}

/// Lower-cased extension of the last path component, or `"unknown"`.
pub fn declared_extension(filename: &str) -> String {
    Path::new(filename.trim())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| UNKNOWN_EXTENSION.to_string())
}
