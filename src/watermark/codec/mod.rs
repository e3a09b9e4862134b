// Codec module - decodes payloads into rasters and encodes composited output
pub mod jpeg;
pub mod png;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use super::error::WatermarkError;
use super::types::{ImagePayload, OutputFormat};

/// A decoded source image plus the color profile to carry into the output
pub struct DecodedImage {
    pub image: DynamicImage,
    pub icc_profile: Option<Vec<u8>>,
}

/// Split a `data:` URL into its MIME type and decoded bytes
pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.trim().strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(data.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Raw encoded bytes of a payload
pub fn payload_bytes(payload: &ImagePayload) -> Result<Vec<u8>, String> {
    match payload {
        ImagePayload::Bytes(bytes) => Ok(bytes.clone()),
        ImagePayload::DataUrl(url) => parse_data_url(url)
            .map(|(_, bytes)| bytes)
            .ok_or_else(|| "malformed data URL".to_string()),
    }
}

/// Wrap encoded output in the same representation as `like`
pub fn to_payload(bytes: Vec<u8>, format: OutputFormat, like: &ImagePayload) -> ImagePayload {
    match like {
        ImagePayload::Bytes(_) => ImagePayload::Bytes(bytes),
        ImagePayload::DataUrl(_) => ImagePayload::DataUrl(to_data_url(format.mime_type(), &bytes)),
    }
}

pub fn decode_bytes(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), image::ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let image = reader.decode()?;
    Ok((image, format))
}

fn extract_icc_profile(bytes: &[u8], format: Option<ImageFormat>) -> Option<Vec<u8>> {
    match format {
        Some(ImageFormat::Jpeg) => jpeg::extract_icc_profile(bytes),
        Some(ImageFormat::Png) => png::extract_icc_profile(bytes),
        _ => None,
    }
}

/// Decode a source payload off the async runtime
pub async fn decode_source(payload: &ImagePayload) -> Result<DecodedImage, WatermarkError> {
    if payload.is_empty() {
        return Err(WatermarkError::SourceDecode("empty image payload".to_string()));
    }
    debug!("Decoding source payload of {} bytes", payload.len());
    let bytes = payload_bytes(payload).map_err(WatermarkError::SourceDecode)?;

    tokio::task::spawn_blocking(move || {
        let (image, format) =
            decode_bytes(&bytes).map_err(|e| WatermarkError::SourceDecode(e.to_string()))?;
        debug!(
            "Decoded source image {}x{}, detected format: {:?}",
            image.width(),
            image.height(),
            format
        );
        let icc_profile = extract_icc_profile(&bytes, format);
        Ok(DecodedImage { image, icc_profile })
    })
    .await?
}

/// Load and decode an overlay image from a `data:` URL or a filesystem path
pub async fn decode_overlay(source: &str) -> Result<DynamicImage, WatermarkError> {
    let source = source.trim();
    let bytes = if source.starts_with("data:") {
        parse_data_url(source)
            .map(|(_, bytes)| bytes)
            .ok_or_else(|| WatermarkError::OverlayDecode("malformed data URL".to_string()))?
    } else if source.starts_with("http://") || source.starts_with("https://") {
        return Err(WatermarkError::OverlayDecode(format!(
            "remote overlay sources are not supported: {}",
            source
        )));
    } else if source.is_empty() {
        return Err(WatermarkError::OverlayDecode(
            "no overlay image configured".to_string(),
        ));
    } else {
        tokio::fs::read(Path::new(source))
            .await
            .map_err(|e| WatermarkError::OverlayDecode(format!("{}: {}", source, e)))?
    };

    tokio::task::spawn_blocking(move || {
        decode_bytes(&bytes)
            .map(|(image, _)| image)
            .map_err(|e| WatermarkError::OverlayDecode(e.to_string()))
    })
    .await?
}

pub fn encode(
    image: &RgbaImage,
    format: OutputFormat,
    jpeg_quality: u8,
    icc_profile: Option<&[u8]>,
) -> Result<Vec<u8>, WatermarkError> {
    match format {
        OutputFormat::Jpeg => jpeg::encode(image, jpeg_quality, icc_profile),
        OutputFormat::Png => png::encode(image),
    }
}
