use ab_glyph::{FontVec, PxScale};
use chrono::Datelike;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage, imageops::FilterType};
use imageproc::drawing::{draw_text_mut, text_size};
use kurbo::Point;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

use super::error::WatermarkError;
use super::geometry::resolve_position;
use super::surface::{Shadow, Surface};
use super::types::{OverlayColor, OverlayKind, OverlaySpec};

/// Drop shadow applied under text for legibility
pub const TEXT_SHADOW: Shadow = Shadow {
    color: Rgba([0, 0, 0, 128]),
    blur: 4.0,
    offset_x: 2.0,
    offset_y: 2.0,
};

/// Largest font size glyphs are rasterized at
const MAX_GLYPH_RASTER_SIZE: f32 = 256.0;
const MAX_GLYPH_MASK_PIXELS: f32 = 4_000_000.0;

/// Resources an overlay needs, loaded before rendering starts
pub enum OverlayContent {
    Text { font: Arc<FontVec> },
    Image(Arc<DynamicImage>),
}

impl OverlayContent {
    fn kind(&self) -> OverlayKind {
        match self {
            OverlayContent::Text { .. } => OverlayKind::Text,
            OverlayContent::Image(_) => OverlayKind::Image,
        }
    }
}

/// Paint the overlay described by `spec` onto `surface`.
///
/// Paint state (alpha, transform, fill, shadow) is scoped to this call.
pub fn render_overlay(
    surface: &mut Surface,
    spec: &OverlaySpec,
    content: &OverlayContent,
) -> Result<(), WatermarkError> {
    if content.kind() != spec.kind {
        return Err(WatermarkError::OverlayDecode(format!(
            "overlay content is {:?} but spec asks for {:?}",
            content.kind(),
            spec.kind
        )));
    }

    surface.with_state(|surface| {
        surface.set_global_alpha(spec.effective_opacity());
        match content {
            OverlayContent::Text { font } => render_text(surface, spec, font),
            OverlayContent::Image(overlay) => render_image(surface, spec, overlay),
        }
        Ok(())
    })
}

/// Replace `{year}` with the current year
pub fn expand_text(text: &str) -> String {
    if text.contains("{year}") {
        text.replace("{year}", &chrono::Local::now().year().to_string())
    } else {
        text.to_string()
    }
}

/// Measured overlay box for a text overlay. Height is the font size.
pub fn measure_text(text: &str, size: f32, font: &FontVec) -> (f32, f32) {
    let (width, _) = text_size(PxScale::from(size), font, text);
    (width as f32, size)
}

fn render_text(surface: &mut Surface, spec: &OverlaySpec, font: &FontVec) {
    let text = expand_text(&spec.text);
    if text.is_empty() || spec.size <= 0.0 || !spec.size.is_finite() {
        return;
    }

    let (width, height) = measure_text(&text, spec.size, font);
    let (x, y) = resolve_position(
        surface.width() as f32,
        surface.height() as f32,
        width,
        height,
        spec.anchor,
        spec.offset_x,
        spec.offset_y,
    );

    let fill = match spec.color {
        OverlayColor::Rgba(color) => color,
        OverlayColor::Auto => determine_text_color(surface.image(), x, y, width, height),
    };
    debug!(
        "Text overlay {:?} box {}x{} at ({}, {})",
        text, width, height, x, y
    );

    surface.set_fill(fill);
    place(surface, x, y, width, height, spec.rotation_degrees);
    surface.set_shadow(Some(TEXT_SHADOW));

    // Glyphs may overhang the measured box; the mask leaves room for that
    let mask_width = width + spec.size * 0.25;
    let mask_height = spec.size * 1.5;
    let raster_size = glyph_raster_size(spec.size, mask_width, mask_height);
    let scale = raster_size / spec.size;
    let mut mask = GrayImage::new(
        ((mask_width * scale).ceil() as u32).max(1),
        ((mask_height * scale).ceil() as u32).max(1),
    );
    draw_text_mut(
        &mut mask,
        Luma([255u8]),
        0,
        0,
        PxScale::from(raster_size),
        font,
        &text,
    );
    let (drawn_width, drawn_height) = (
        mask.width() as f32 / scale,
        mask.height() as f32 / scale,
    );
    surface.fill_mask(&mask, drawn_width, drawn_height);
}

/// Font size glyphs are rasterized at. Large text is rasterized smaller and
/// scaled up by the surface transform so the mask stays bounded.
fn glyph_raster_size(size: f32, mask_width: f32, mask_height: f32) -> f32 {
    let mut raster_size = size.min(MAX_GLYPH_RASTER_SIZE);
    let scale = raster_size / size;
    let pixels = (mask_width * scale) * (mask_height * scale);
    if pixels > MAX_GLYPH_MASK_PIXELS {
        raster_size *= (MAX_GLYPH_MASK_PIXELS / pixels).sqrt();
    }
    raster_size
}

fn render_image(surface: &mut Surface, spec: &OverlaySpec, overlay: &DynamicImage) {
    let (native_width, native_height) = (overlay.width(), overlay.height());
    if native_width == 0 || native_height == 0 {
        return;
    }

    let width = spec.size * 2.0;
    if width <= 0.0 || !width.is_finite() {
        return;
    }
    let height = width / (native_width as f32 / native_height as f32);

    let (x, y) = resolve_position(
        surface.width() as f32,
        surface.height() as f32,
        width,
        height,
        spec.anchor,
        spec.offset_x,
        spec.offset_y,
    );
    debug!("Image overlay box {}x{} at ({}, {})", width, height, x, y);

    place(surface, x, y, width, height, spec.rotation_degrees);

    // Only ever shrink the overlay ahead of time. Enlarging happens while
    // sampling, which touches just the visible pixels.
    let tile_width = (width.round() as u32).max(1);
    let tile_height = (height.round() as u32).max(1);
    let shrinks = tile_width <= native_width
        && tile_height <= native_height
        && (tile_width, tile_height) != (native_width, native_height);
    let tile: RgbaImage = if shrinks {
        overlay
            .resize_exact(tile_width, tile_height, FilterType::Lanczos3)
            .to_rgba8()
    } else {
        overlay.to_rgba8()
    };
    surface.draw_image(&tile, width, height);
}

/// Move the paint origin to the overlay box, rotating about the box center
fn place(surface: &mut Surface, x: f32, y: f32, width: f32, height: f32, degrees: f32) {
    let (x, y) = (f64::from(x), f64::from(y));
    let (half_width, half_height) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    if degrees != 0.0 {
        surface.translate(x + half_width, y + half_height);
        surface.rotate(f64::from(degrees) * PI / 180.0);
        surface.translate(-half_width, -half_height);
    } else {
        surface.translate(x, y);
    }
}

/// Pick black or white text from the average WCAG luminance under the box
fn determine_text_color(image: &RgbaImage, x: f32, y: f32, width: f32, height: f32) -> Rgba<u8> {
    let x_start = x.max(0.0).floor() as u32;
    let y_start = y.max(0.0).floor() as u32;
    let x_end = ((x + width).max(0.0).ceil() as u32).min(image.width());
    let y_end = ((y + height).max(0.0).ceil() as u32).min(image.height());

    let linear = |c: u8| {
        let c = f32::from(c) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };

    let mut total_luminance = 0.0;
    let mut pixel_count = 0u32;
    for py in y_start..y_end {
        for px in x_start..x_end {
            let pixel = image.get_pixel(px, py);
            total_luminance +=
                0.2126 * linear(pixel[0]) + 0.7152 * linear(pixel[1]) + 0.0722 * linear(pixel[2]);
            pixel_count += 1;
        }
    }

    if pixel_count == 0 {
        return Rgba([255, 255, 255, 255]);
    }

    if total_luminance / (pixel_count as f32) < 0.5 {
        Rgba([255, 255, 255, 255])
    } else {
        Rgba([0, 0, 0, 255])
    }
}
