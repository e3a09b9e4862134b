use std::sync::Arc;
use tracing::debug;

use super::codec;
use super::error::WatermarkError;
use super::fonts::FontLibrary;
use super::render::{OverlayContent, render_overlay};
use super::surface::Surface;
use super::types::{ImagePayload, OutputFormat, OverlayKind, OverlaySpec};
use crate::Config;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Composites overlays onto encoded images
pub struct Compositor {
    fonts: FontLibrary,
    output_format: OutputFormat,
    jpeg_quality: u8,
}

impl Compositor {
    pub fn new(fonts: FontLibrary) -> Self {
        Self {
            fonts,
            output_format: OutputFormat::Jpeg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(FontLibrary::new(
            config.fonts.directory.clone(),
            config.fonts.default_family.clone(),
        ))
        .with_output(
            config.output.format,
            config.output.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        )
    }

    pub fn with_output(mut self, format: OutputFormat, jpeg_quality: u8) -> Self {
        self.output_format = format;
        self.jpeg_quality = jpeg_quality.clamp(1, 100);
        self
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Composite the overlay described by `spec` onto `source`.
    ///
    /// A disabled spec returns `source` untouched. Otherwise the output has the
    /// source's pixel dimensions and the same payload representation.
    pub async fn composite(
        &self,
        source: &ImagePayload,
        spec: &OverlaySpec,
    ) -> Result<ImagePayload, WatermarkError> {
        if !spec.enabled {
            return Ok(source.clone());
        }

        let decoded = codec::decode_source(source).await?;
        let content = self.load_content(spec).await?;

        let spec = spec.clone();
        let format = self.output_format;
        let quality = self.jpeg_quality;
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, WatermarkError> {
            let source_image = decoded.image.to_rgba8();
            let mut surface = Surface::new(source_image.width(), source_image.height());
            surface.blit(&source_image, 0, 0);
            drop(source_image);

            render_overlay(&mut surface, &spec, &content)?;

            codec::encode(
                surface.image(),
                format,
                quality,
                decoded.icc_profile.as_deref(),
            )
        })
        .await??;

        debug!("Composited image: {} bytes as {:?}", bytes.len(), format);
        Ok(codec::to_payload(bytes, format, source))
    }

    async fn load_content(&self, spec: &OverlaySpec) -> Result<OverlayContent, WatermarkError> {
        match spec.kind {
            OverlayKind::Text => {
                let font = self.fonts.load(&spec.font_family, spec.font_weight).await?;
                Ok(OverlayContent::Text { font })
            }
            OverlayKind::Image => {
                let overlay = codec::decode_overlay(&spec.image_source).await?;
                Ok(OverlayContent::Image(Arc::new(overlay)))
            }
        }
    }
}
