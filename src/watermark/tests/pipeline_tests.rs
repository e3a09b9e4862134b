use crate::watermark::codec::{self, jpeg, png};
use crate::watermark::{
    Anchor, Compositor, FontLibrary, ImagePayload, OutputFormat, OverlayColor, OverlaySpec,
    WatermarkError,
};
use image::{GenericImageView, Rgba, RgbaImage};
use std::path::Path;
use tempfile::TempDir;

// Helper to build a compositor whose font directory is a fresh temp dir
fn create_test_compositor(format: OutputFormat) -> (Compositor, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let compositor =
        Compositor::new(FontLibrary::new(temp_dir.path(), "DejaVuSans")).with_output(format, 90);
    (compositor, temp_dir)
}

fn solid_png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    png::encode(&RgbaImage::from_pixel(width, height, color)).unwrap()
}

fn write_overlay(dir: &TempDir, name: &str, width: u32, height: u32, color: Rgba<u8>) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, solid_png(width, height, color)).unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_disabled_spec_is_byte_identical_pass_through() {
    let (compositor, _temp_dir) = create_test_compositor(OutputFormat::Jpeg);
    let spec = OverlaySpec::image("/does/not/matter.png").with_enabled(false);

    // Not even decodable: a disabled spec must never touch the bytes
    let garbage = ImagePayload::Bytes(b"\x00\x01 not an image".to_vec());
    let result = compositor.composite(&garbage, &spec).await.unwrap();
    assert_eq!(result, garbage);

    let source = ImagePayload::Bytes(solid_png(32, 16, Rgba([1, 2, 3, 255])));
    let result = compositor.composite(&source, &spec).await.unwrap();
    assert_eq!(result, source);

    let url = ImagePayload::DataUrl(codec::to_data_url("image/png", &solid_png(4, 4, Rgba([9, 9, 9, 255]))));
    assert_eq!(compositor.composite(&url, &spec).await.unwrap(), url);
}

#[tokio::test]
async fn test_output_dimensions_match_source() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Jpeg);
    let overlay = write_overlay(&temp_dir, "logo.png", 300, 100, Rgba([255, 0, 0, 255]));

    for (width, height) in [(640, 480), (37, 91), (1, 1)] {
        let source = ImagePayload::Bytes(solid_png(width, height, Rgba([200, 200, 200, 255])));
        // The overlay is much larger than the small sources
        let spec = OverlaySpec::image(overlay.clone())
            .with_size(150.0)
            .with_rotation(20.0)
            .with_opacity(0.7);
        let result = compositor.composite(&source, &spec).await.unwrap();
        let bytes = codec::payload_bytes(&result).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (width, height));
    }
}

#[tokio::test]
async fn test_source_decode_error() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Png);
    let overlay = write_overlay(&temp_dir, "logo.png", 10, 10, Rgba([255, 0, 0, 255]));
    let spec = OverlaySpec::image(overlay);

    let result = compositor
        .composite(&ImagePayload::Bytes(b"corrupt".to_vec()), &spec)
        .await;
    match result {
        Err(e @ WatermarkError::SourceDecode(_)) => assert!(e.is_decode_failure()),
        other => panic!("expected SourceDecode, got {:?}", other),
    }
}

#[tokio::test]
async fn test_overlay_decode_error() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Png);
    let broken = temp_dir.path().join("broken.png");
    std::fs::write(&broken, b"not a png").unwrap();
    let source = ImagePayload::Bytes(solid_png(20, 20, Rgba([0, 0, 0, 255])));

    for overlay in [
        broken.to_str().unwrap().to_string(),
        temp_dir.path().join("missing.png").to_str().unwrap().to_string(),
    ] {
        let result = compositor.composite(&source, &OverlaySpec::image(overlay)).await;
        match result {
            Err(e @ WatermarkError::OverlayDecode(_)) => assert!(e.is_decode_failure()),
            other => panic!("expected OverlayDecode, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_text_without_font_is_font_error() {
    let (compositor, _temp_dir) = create_test_compositor(OutputFormat::Png);
    let source = ImagePayload::Bytes(solid_png(20, 20, Rgba([0, 0, 0, 255])));
    let result = compositor
        .composite(&source, &OverlaySpec::text("Hello"))
        .await;
    match result {
        Err(e @ WatermarkError::Font(_)) => assert!(!e.is_decode_failure()),
        other => panic!("expected Font error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_data_url_in_data_url_out() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Jpeg);
    let overlay = write_overlay(&temp_dir, "logo.png", 8, 8, Rgba([0, 255, 0, 255]));
    let source = ImagePayload::DataUrl(codec::to_data_url(
        "image/png",
        &solid_png(24, 12, Rgba([255, 255, 255, 255])),
    ));

    let result = compositor
        .composite(&source, &OverlaySpec::image(overlay).with_size(4.0))
        .await
        .unwrap();
    let ImagePayload::DataUrl(url) = &result else {
        panic!("expected a data URL, got {:?}", result);
    };
    let (mime, bytes) = codec::parse_data_url(url).unwrap();
    assert_eq!(mime, "image/jpeg");
    assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (24, 12));
}

#[tokio::test]
async fn test_opacity_does_not_leak_between_composites() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Png);
    let overlay = write_overlay(&temp_dir, "red.png", 10, 10, Rgba([255, 0, 0, 255]));
    let source = ImagePayload::Bytes(solid_png(50, 50, Rgba([255, 255, 255, 255])));

    let base = OverlaySpec::image(overlay)
        .with_anchor(Anchor::TopLeft)
        .with_offsets(0.0, 0.0)
        .with_size(5.0);
    let opaque = base.clone().with_opacity(1.0);
    let faint = base.with_opacity(0.25);

    let first = compositor.composite(&source, &opaque).await.unwrap();
    let second = compositor.composite(&source, &faint).await.unwrap();

    let (fresh, _fresh_dir) = create_test_compositor(OutputFormat::Png);
    let isolated = fresh.composite(&source, &faint).await.unwrap();
    assert_eq!(second, isolated);

    let decode = |payload: &ImagePayload| {
        image::load_from_memory(&codec::payload_bytes(payload).unwrap())
            .unwrap()
            .to_rgba8()
    };
    assert_eq!(*decode(&first).get_pixel(5, 5), Rgba([255, 0, 0, 255]));
    assert_eq!(*decode(&second).get_pixel(5, 5), Rgba([255, 191, 191, 255]));
    assert_eq!(*decode(&second).get_pixel(20, 20), Rgba([255, 255, 255, 255]));
}

#[tokio::test]
async fn test_out_of_range_opacity_is_clamped() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Png);
    let overlay = write_overlay(&temp_dir, "red.png", 10, 10, Rgba([255, 0, 0, 255]));
    let source = ImagePayload::Bytes(solid_png(30, 30, Rgba([255, 255, 255, 255])));
    let base = OverlaySpec::image(overlay)
        .with_anchor(Anchor::TopLeft)
        .with_offsets(0.0, 0.0)
        .with_size(5.0);

    let over = compositor
        .composite(&source, &base.clone().with_opacity(3.0))
        .await
        .unwrap();
    let full = compositor
        .composite(&source, &base.clone().with_opacity(1.0))
        .await
        .unwrap();
    assert_eq!(over, full);

    let under = compositor
        .composite(&source, &base.with_opacity(-1.0))
        .await
        .unwrap();
    let decoded = image::load_from_memory(&codec::payload_bytes(&under).unwrap())
        .unwrap()
        .to_rgba8();
    assert!(decoded.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
}

#[tokio::test]
async fn test_icc_profile_is_carried_into_jpeg_output() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Jpeg);
    let overlay = write_overlay(&temp_dir, "logo.png", 4, 4, Rgba([0, 0, 0, 255]));
    let profile = vec![42u8; 128];
    let source_bytes = jpeg::encode(
        &RgbaImage::from_pixel(16, 16, Rgba([120, 130, 140, 255])),
        90,
        Some(&profile),
    )
    .unwrap();

    let result = compositor
        .composite(&ImagePayload::Bytes(source_bytes), &OverlaySpec::image(overlay))
        .await
        .unwrap();
    let bytes = codec::payload_bytes(&result).unwrap();
    assert_eq!(jpeg::extract_icc_profile(&bytes), Some(profile));
}

#[tokio::test]
async fn test_text_overlay_with_real_font() {
    let font_dir = Path::new("static");

    let compositor =
        Compositor::new(FontLibrary::new(font_dir, "DejaVuSans")).with_output(OutputFormat::Png, 90);
    let source = ImagePayload::Bytes(solid_png(200, 100, Rgba([40, 40, 40, 255])));
    let mut spec = OverlaySpec::text("© {year} Test")
        .with_anchor(Anchor::Center)
        .with_offsets(0.0, 0.0)
        .with_opacity(1.0)
        .with_size(20.0);
    spec.color = OverlayColor::Auto;

    let result = compositor.composite(&source, &spec).await.unwrap();
    let decoded = image::load_from_memory(&codec::payload_bytes(&result).unwrap())
        .unwrap()
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (200, 100));
    // Auto color on a dark background paints white text
    assert!(decoded.pixels().any(|p| p[0] > 200 && p[1] > 200 && p[2] > 200));
    // Corners stay untouched
    assert_eq!(*decoded.get_pixel(0, 0), Rgba([40, 40, 40, 255]));
}

#[tokio::test]
async fn test_huge_overlay_size_still_composites() {
    let (compositor, temp_dir) = create_test_compositor(OutputFormat::Png);
    let overlay = write_overlay(&temp_dir, "logo.png", 8, 8, Rgba([255, 0, 0, 255]));
    let source = ImagePayload::Bytes(solid_png(10, 10, Rgba([0, 0, 255, 255])));
    let spec = OverlaySpec::image(overlay)
        .with_size(1_000_000.0)
        .with_opacity(1.0);

    let result = compositor.composite(&source, &spec).await.unwrap();
    let decoded = image::load_from_memory(&codec::payload_bytes(&result).unwrap()).unwrap();
    assert_eq!(decoded.dimensions(), (10, 10));

    let text_compositor = Compositor::new(FontLibrary::new("static", "DejaVuSans"))
        .with_output(OutputFormat::Png, 90);
    let spec = OverlaySpec::text("Huge").with_size(1_000_000.0);
    let result = text_compositor.composite(&source, &spec).await.unwrap();
    let decoded = image::load_from_memory(&codec::payload_bytes(&result).unwrap()).unwrap();
    assert_eq!(decoded.dimensions(), (10, 10));
}
