use image::{ExtendedColorType, ImageEncoder, RgbaImage, codecs::jpeg::JpegEncoder};
use tracing::debug;

use crate::watermark::WatermarkError;

const ICC_MARKER: &[u8] = b"ICC_PROFILE\0";

/// Extract the ICC profile from JPEG APP2 segments, joining multi-chunk profiles
pub fn extract_icc_profile(buffer: &[u8]) -> Option<Vec<u8>> {
    if buffer.len() < 4 || buffer[0] != 0xFF || buffer[1] != 0xD8 {
        return None;
    }

    let mut chunks: Vec<(u8, &[u8])> = Vec::new();
    let mut pos = 2;
    while pos + 4 <= buffer.len() {
        if buffer[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = buffer[pos + 1];
        // Fill bytes and standalone markers carry no length
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0xD8 || (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        // Start of scan or end of image: no more metadata segments
        if marker == 0xDA || marker == 0xD9 {
            break;
        }

        let segment_length = u16::from_be_bytes([buffer[pos + 2], buffer[pos + 3]]) as usize;
        let segment_end = pos + 2 + segment_length;
        if segment_length < 2 || segment_end > buffer.len() {
            break;
        }

        if marker == 0xE2 {
            let data = &buffer[pos + 4..segment_end];
            if data.len() > ICC_MARKER.len() + 2 && data.starts_with(ICC_MARKER) {
                let sequence = data[ICC_MARKER.len()];
                chunks.push((sequence, &data[ICC_MARKER.len() + 2..]));
            }
        }
        pos = segment_end;
    }

    if chunks.is_empty() {
        return None;
    }
    chunks.sort_by_key(|(sequence, _)| *sequence);
    let profile: Vec<u8> = chunks.into_iter().flat_map(|(_, data)| data.to_vec()).collect();
    debug!("Found ICC profile in JPEG: {} bytes", profile.len());
    Some(profile)
}

/// Encode as JPEG with optional ICC profile
pub fn encode(
    image: &RgbaImage,
    quality: u8,
    icc_profile: Option<&[u8]>,
) -> Result<Vec<u8>, WatermarkError> {
    // JPEG has no alpha channel
    let rgb_image = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);

    if let Some(profile_data) = icc_profile
        && let Err(e) = encoder.set_icc_profile(profile_data.to_vec())
    {
        debug!(
            "Failed to set ICC profile on JPEG encoder ({}), using standard JPEG",
            e
        );
    }

    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(output)
}
