use crate::Config;
use crate::settings::SettingsConfig;
use crate::watermark::{FontLibrary, FontWeight};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create settings directory: {0}")]
    SettingsDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Font directory does not exist: {0}")]
    FontDirectoryMissing(String),

    #[error("Default font missing: {0}")]
    DefaultFontMissing(String),

    #[error("Settings file is unreadable: {0}")]
    SettingsUnreadable(String),
}

impl StartupCheckError {
    /// Whether text overlays can still work with this error present
    pub fn is_critical(&self) -> bool {
        matches!(self, StartupCheckError::SettingsDirectoryCreationFailed(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    // Font directory and default font
    let font_dir = &config.fonts.directory;
    if !font_dir.exists() {
        warn!("Font directory does not exist: {:?}", font_dir);
        errors.push(StartupCheckError::FontDirectoryMissing(
            font_dir.display().to_string(),
        ));
    } else {
        info!("Font directory exists: {:?}", font_dir);
        let library = FontLibrary::new(font_dir.clone(), config.fonts.default_family.clone());
        match library
            .load(&config.fonts.default_family, FontWeight::Normal)
            .await
        {
            Ok(_) => info!("Default font '{}' loaded", config.fonts.default_family),
            Err(e) => {
                warn!("Default font unavailable, text overlays will fail: {}", e);
                errors.push(StartupCheckError::DefaultFontMissing(
                    config.fonts.default_family.clone(),
                ));
            }
        }
    }

    // Settings location
    if let SettingsConfig::File { path } = &config.settings {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            info!("Settings directory does not exist, creating: {:?}", parent);
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!("Failed to create settings directory: {}", e);
                errors.push(StartupCheckError::SettingsDirectoryCreationFailed(e));
            }
        }

        if path.exists() {
            let store = crate::settings::providers::file::JsonFileStore::new(path.clone());
            match store.load().await {
                Ok(_) => info!("Settings file is readable: {:?}", path),
                Err(e) => {
                    error!("Settings file {:?} is unreadable: {}", path, e);
                    errors.push(StartupCheckError::SettingsUnreadable(e.to_string()));
                }
            }
        } else {
            info!("No settings file yet at {:?}", path);
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
