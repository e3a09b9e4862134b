use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SettingsConfig {
    File { path: PathBuf },
    Memory,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        SettingsConfig::File {
            path: PathBuf::from("watermark-settings.json"),
        }
    }
}
