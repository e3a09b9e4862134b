use tracing::{debug, error};

use crate::settings::SettingsStore;
use crate::watermark::{Compositor, ImagePayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUpload {
    pub image: ImagePayload,
    pub watermarked: bool,
}

impl PreparedUpload {
    fn original(image: &ImagePayload) -> Self {
        Self {
            image: image.clone(),
            watermarked: false,
        }
    }
}

/// Watermark an incoming upload when auto-apply is on.
///
/// Any failure along the way leaves the original upload usable.
pub async fn prepare_upload(
    store: &dyn SettingsStore,
    compositor: &Compositor,
    image: &ImagePayload,
) -> PreparedUpload {
    let auto_apply = match store.is_auto_apply_enabled().await {
        Ok(enabled) => enabled,
        Err(e) => {
            error!("Failed to read auto-apply setting from {}: {}", store.name(), e);
            return PreparedUpload::original(image);
        }
    };
    if !auto_apply {
        return PreparedUpload::original(image);
    }

    let spec = match store.overlay_spec().await {
        Ok(Some(spec)) if spec.enabled => spec,
        Ok(_) => {
            debug!("Auto-apply is on but no enabled overlay is saved");
            return PreparedUpload::original(image);
        }
        Err(e) => {
            error!("Failed to read overlay settings from {}: {}", store.name(), e);
            return PreparedUpload::original(image);
        }
    };

    match compositor.composite(image, &spec).await {
        Ok(watermarked) => PreparedUpload {
            image: watermarked,
            watermarked: true,
        },
        Err(e) => {
            error!("Failed to apply watermark to upload: {}", e);
            PreparedUpload::original(image)
        }
    }
}
