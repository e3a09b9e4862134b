use flate2::read::ZlibDecoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage, codecs::png::PngEncoder};
use std::io::Read;
use tracing::debug;

use crate::watermark::WatermarkError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Extract the ICC profile from a PNG iCCP chunk
pub fn extract_icc_profile(buffer: &[u8]) -> Option<Vec<u8>> {
    if buffer.len() < 8 || &buffer[0..8] != PNG_SIGNATURE {
        return None;
    }

    let mut pos = 8;
    while pos + 12 <= buffer.len() {
        let chunk_length = u32::from_be_bytes([
            buffer[pos],
            buffer[pos + 1],
            buffer[pos + 2],
            buffer[pos + 3],
        ]) as usize;
        let chunk_type = &buffer[pos + 4..pos + 8];
        let chunk_data_start = pos + 8;
        let chunk_data_end = chunk_data_start.checked_add(chunk_length)?;

        if chunk_type == b"iCCP" && chunk_data_end <= buffer.len() {
            // Profile name, NUL, compression method (0 = deflate), compressed profile
            let chunk_data = &buffer[chunk_data_start..chunk_data_end];
            if let Some(null_pos) = chunk_data.iter().position(|&b| b == 0)
                && null_pos + 2 < chunk_data.len()
                && chunk_data[null_pos + 1] == 0
            {
                let mut decoder = ZlibDecoder::new(&chunk_data[null_pos + 2..]);
                let mut decompressed = Vec::new();
                if decoder.read_to_end(&mut decompressed).is_ok() {
                    debug!(
                        "Found ICC profile in PNG: {} bytes (decompressed)",
                        decompressed.len()
                    );
                    return Some(decompressed);
                }
            }
        }

        if chunk_type == b"IEND" || chunk_type == b"IDAT" {
            break;
        }
        pos = chunk_data_end + 4;
    }

    None
}

pub fn encode(image: &RgbaImage) -> Result<Vec<u8>, WatermarkError> {
    let mut output = Vec::new();
    PngEncoder::new(&mut output).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(output)
}
