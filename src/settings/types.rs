use serde::{Deserialize, Serialize};

use crate::watermark::OverlaySpec;

/// Everything the settings store persists
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default)]
    pub overlay: Option<OverlaySpec>,
    #[serde(default)]
    pub auto_apply: bool,
}
