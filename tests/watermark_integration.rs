use image::{GenericImageView, Rgba, RgbaImage};
use sukashi::settings::{SettingsConfig, create_store};
use sukashi::upload::prepare_upload;
use sukashi::watermark::codec::{png, to_data_url};
use sukashi::watermark::{
    Anchor, BatchProcessor, Compositor, FontLibrary, ImagePayload, ItemStatus, OutputFormat,
    OverlaySpec,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn png_payload(width: u32, height: u32, color: [u8; 4]) -> ImagePayload {
    ImagePayload::Bytes(png::encode(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap())
}

fn overlay_data_url() -> String {
    let logo = png::encode(&RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]))).unwrap();
    to_data_url("image/png", &logo)
}

fn create_compositor(temp_dir: &TempDir) -> Compositor {
    Compositor::new(FontLibrary::new(temp_dir.path(), "DejaVuSans"))
        .with_output(OutputFormat::Png, 90)
}

fn decode(payload: &ImagePayload) -> image::DynamicImage {
    match payload {
        ImagePayload::Bytes(bytes) => image::load_from_memory(bytes).unwrap(),
        ImagePayload::DataUrl(_) => panic!("expected raw bytes"),
    }
}

#[tokio::test]
async fn test_image_overlay_lands_in_bottom_right_corner() {
    let temp_dir = TempDir::new().unwrap();
    let compositor = create_compositor(&temp_dir);
    let spec = OverlaySpec::image(overlay_data_url())
        .with_anchor(Anchor::BottomRight)
        .with_size(10.0)
        .with_opacity(1.0)
        .with_offsets(5.0, 5.0);

    let source = png_payload(100, 80, [0, 0, 0, 255]);
    let result = compositor.composite(&source, &spec).await.unwrap();
    let image = decode(&result);

    assert_eq!(image.dimensions(), (100, 80));
    // 20x20 overlay placed at (75, 55)
    assert_eq!(image.get_pixel(85, 65), Rgba([255, 255, 255, 255]));
    assert_eq!(image.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
}

#[tokio::test]
async fn test_batch_keeps_originals_for_broken_inputs() {
    let temp_dir = TempDir::new().unwrap();
    let compositor = create_compositor(&temp_dir);
    let spec = OverlaySpec::image(overlay_data_url()).with_size(5.0);

    let broken = ImagePayload::Bytes(b"definitely not an image".to_vec());
    let sources = vec![
        png_payload(30, 30, [10, 20, 30, 255]),
        broken.clone(),
        png_payload(40, 20, [10, 20, 30, 255]),
    ];

    let mut progress = Vec::new();
    let outcome = BatchProcessor::new(&compositor)
        .with_progress(|done, total| progress.push((done, total)))
        .run(&sources, &spec)
        .await;

    assert_eq!(outcome.success_flags(), vec![true, false, true]);
    assert_eq!(outcome.items[1].image, broken);
    assert!(matches!(outcome.items[1].status, ItemStatus::Failed(_)));
    assert_eq!(decode(&outcome.items[2].image).dimensions(), (40, 20));
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(outcome.summary(), "2 of 3 images watermarked successfully");
}

#[tokio::test]
async fn test_cancelled_batch_skips_everything() {
    let temp_dir = TempDir::new().unwrap();
    let compositor = create_compositor(&temp_dir);
    let spec = OverlaySpec::image(overlay_data_url());
    let sources = vec![png_payload(10, 10, [0, 0, 0, 255]); 3];

    let token = CancellationToken::new();
    token.cancel();
    let outcome = BatchProcessor::new(&compositor)
        .with_cancellation(token)
        .run(&sources, &spec)
        .await;

    assert!(outcome.cancelled);
    assert!(outcome.items.iter().all(|item| item.status == ItemStatus::Skipped));
    assert_eq!(outcome.into_images(), sources);
}

#[tokio::test]
async fn test_saved_settings_drive_upload_watermarking() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.json");
    let config = SettingsConfig::File {
        path: settings_path.clone(),
    };

    let store = create_store(&config);
    let spec = OverlaySpec::image(overlay_data_url())
        .with_anchor(Anchor::Center)
        .with_opacity(1.0);
    store.save_overlay_spec(&spec).await.unwrap();
    store.set_auto_apply(true).await.unwrap();
    assert!(settings_path.exists());

    // A fresh store over the same file sees the saved state
    let reopened = create_store(&config);
    assert_eq!(reopened.overlay_spec().await.unwrap(), Some(spec));
    assert!(reopened.is_auto_apply_enabled().await.unwrap());

    let compositor = create_compositor(&temp_dir);
    let upload = png_payload(50, 50, [0, 0, 0, 255]);
    let prepared = prepare_upload(reopened.as_ref(), &compositor, &upload).await;
    assert!(prepared.watermarked);
    assert_eq!(decode(&prepared.image).get_pixel(25, 25)[0], 255);

    reopened.set_auto_apply(false).await.unwrap();
    let prepared = prepare_upload(reopened.as_ref(), &compositor, &upload).await;
    assert!(!prepared.watermarked);
    assert_eq!(prepared.image, upload);
}

#[tokio::test]
async fn test_data_url_source_round_trips_as_data_url() {
    let temp_dir = TempDir::new().unwrap();
    let compositor = create_compositor(&temp_dir);
    let spec = OverlaySpec::image(overlay_data_url());

    let ImagePayload::Bytes(bytes) = png_payload(16, 16, [0, 0, 0, 255]) else {
        unreachable!()
    };
    let source = ImagePayload::DataUrl(to_data_url("image/png", &bytes));
    let result = compositor.composite(&source, &spec).await.unwrap();

    let ImagePayload::DataUrl(url) = result else {
        panic!("expected a data URL back");
    };
    assert!(url.starts_with("data:image/png;base64,"));
}
