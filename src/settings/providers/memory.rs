use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::settings::{SettingsDocument, SettingsError, SettingsStore};
use crate::watermark::OverlaySpec;

/// Process-local settings that are never persisted
#[derive(Default)]
pub struct MemoryStore {
    document: RwLock<SettingsDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn overlay_spec(&self) -> Result<Option<OverlaySpec>, SettingsError> {
        Ok(self.document.read().await.overlay.clone())
    }

    async fn save_overlay_spec(&self, spec: &OverlaySpec) -> Result<(), SettingsError> {
        self.document.write().await.overlay = Some(spec.clone());
        Ok(())
    }

    async fn is_auto_apply_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.document.read().await.auto_apply)
    }

    async fn set_auto_apply(&self, enabled: bool) -> Result<(), SettingsError> {
        self.document.write().await.auto_apply = enabled;
        Ok(())
    }

    fn name(&self) -> &str {
        "In-memory"
    }
}
