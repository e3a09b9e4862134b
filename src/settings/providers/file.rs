use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::settings::{SettingsDocument, SettingsError, SettingsStore};
use crate::watermark::OverlaySpec;

/// Settings persisted as a JSON document on disk.
///
/// Every read loads the file; every write rewrites it. A missing file reads as
/// empty settings.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<SettingsDocument, SettingsError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {:?}, using defaults", self.path);
                return Ok(SettingsDocument::default());
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(SettingsDocument::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    async fn update(
        &self,
        change: impl FnOnce(&mut SettingsDocument),
    ) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        change(&mut document);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never see a half-written file
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(&document)?).await?;
        fs::rename(&temp_path, &self.path).await?;
        debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn overlay_spec(&self) -> Result<Option<OverlaySpec>, SettingsError> {
        Ok(self.load().await?.overlay)
    }

    async fn save_overlay_spec(&self, spec: &OverlaySpec) -> Result<(), SettingsError> {
        let spec = spec.clone();
        self.update(move |document| document.overlay = Some(spec)).await
    }

    async fn is_auto_apply_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.load().await?.auto_apply)
    }

    async fn set_auto_apply(&self, enabled: bool) -> Result<(), SettingsError> {
        self.update(move |document| document.auto_apply = enabled).await
    }

    fn name(&self) -> &str {
        "JSON file"
    }
}
