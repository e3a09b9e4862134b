pub mod config;
pub mod error;
pub mod providers;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

use crate::watermark::OverlaySpec;

/// Holds the single active overlay spec and the auto-apply flag
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn overlay_spec(&self) -> Result<Option<OverlaySpec>, SettingsError>;
    async fn save_overlay_spec(&self, spec: &OverlaySpec) -> Result<(), SettingsError>;
    async fn is_auto_apply_enabled(&self) -> Result<bool, SettingsError>;
    async fn set_auto_apply(&self, enabled: bool) -> Result<(), SettingsError>;
    fn name(&self) -> &str;
}

pub type DynSettingsStore = Arc<dyn SettingsStore>;

pub fn create_store(config: &SettingsConfig) -> DynSettingsStore {
    match config {
        SettingsConfig::File { path } => Arc::new(providers::file::JsonFileStore::new(path.clone())),
        SettingsConfig::Memory => Arc::new(providers::memory::MemoryStore::new()),
    }
}
