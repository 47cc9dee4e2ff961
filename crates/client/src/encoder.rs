use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;
use tracing::debug;

use crate::config::EncoderConfig;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[source] image::ImageError),
    #[error("JPEG encoder produced no data")]
    EmptyOutput,
}

/// An image ready to embed in a JSON payload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    /// Size of the JPEG before base64.
    pub jpeg_len: usize,
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, EncodeError> {
    image::load_from_memory(bytes).map_err(EncodeError::Decode)
}

pub fn open_image(path: &Path) -> Result<DynamicImage, EncodeError> {
    image::open(path).map_err(EncodeError::Decode)
}

/// Scale `width`x`height` by min(width ratio, height ratio) so it fits the box.
/// Neither side drops below one pixel. Returns None for an empty source or box.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return None;
    }
    let width_ratio = max_width as f64 / width as f64;
    let height_ratio = max_height as f64 / height as f64;
    let scale = width_ratio.min(height_ratio);

    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    Some((new_width, new_height))
}

/// Resize to fit the bounding box, or return the original unchanged when no
/// valid target size exists.
pub fn resize_to_fit(img: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    match fit_dimensions(width, height, max_width, max_height) {
        Some((w, h)) if (w, h) == (width, height) => img.clone(),
        Some((w, h)) => img.resize_exact(w, h, FilterType::Triangle),
        None => {
            debug!("Resize to {max_width}x{max_height} not possible for {width}x{height}, keeping original");
            img.clone()
        }
    }
}

/// Encode as baseline JPEG. Alpha is dropped since JPEG has no alpha channel.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder).map_err(EncodeError::Jpeg)?;

    let bytes = buf.into_inner();
    if bytes.is_empty() {
        return Err(EncodeError::EmptyOutput);
    }
    Ok(bytes)
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 data URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(data.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

/// Resize, JPEG-encode and wrap an image as a data URI.
pub fn encode_image(img: &DynamicImage, config: &EncoderConfig) -> Result<EncodedImage, EncodeError> {
    let resized = resize_to_fit(img, config.max_width, config.max_height);
    let jpeg = encode_jpeg(&resized, config.quality)?;
    debug!(
        "Encoded {}x{} JPEG, {} bytes",
        resized.width(),
        resized.height(),
        jpeg.len()
    );

    Ok(EncodedImage {
        data_uri: to_data_uri(JPEG_MIME, &jpeg),
        width: resized.width(),
        height: resized.height(),
        jpeg_len: jpeg.len(),
    })
}
