use ab_glyph::FontVec;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::WatermarkError;
use super::types::FontWeight;

const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// Resolves font families to files in a directory and caches parsed fonts
pub struct FontLibrary {
    directory: PathBuf,
    default_family: String,
    cache: RwLock<HashMap<(String, FontWeight), Arc<FontVec>>>,
}

impl FontLibrary {
    pub fn new(directory: impl Into<PathBuf>, default_family: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            default_family: default_family.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Candidate files for a family, most specific first
    pub fn candidates(&self, family: &str, weight: FontWeight) -> Vec<PathBuf> {
        let mut families = Vec::new();
        if is_safe_family(family) {
            families.push(family.trim());
        } else if !family.trim().is_empty() {
            warn!("Ignoring unsafe font family name {:?}", family);
        }
        if families.first() != Some(&self.default_family.as_str()) {
            families.push(self.default_family.as_str());
        }

        let mut paths = Vec::new();
        for name in families {
            if weight == FontWeight::Bold {
                for ext in FONT_EXTENSIONS {
                    paths.push(self.directory.join(format!("{}-Bold.{}", name, ext)));
                }
            }
            for ext in FONT_EXTENSIONS {
                paths.push(self.directory.join(format!("{}.{}", name, ext)));
            }
        }
        paths
    }

    pub async fn load(&self, family: &str, weight: FontWeight) -> Result<Arc<FontVec>, WatermarkError> {
        let key = (family.to_string(), weight);
        {
            let cache = self.cache.read().await;
            if let Some(font) = cache.get(&key) {
                return Ok(font.clone());
            }
        }

        for path in self.candidates(family, weight) {
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(_) => continue,
            };
            let font = FontVec::try_from_vec(data).map_err(|_| {
                WatermarkError::Font(format!("Failed to parse font {}", path.display()))
            })?;
            debug!("Loaded font {:?} for family {:?} ({:?})", path, family, weight);

            let font = Arc::new(font);
            let mut cache = self.cache.write().await;
            cache.insert(key, font.clone());
            return Ok(font);
        }

        Err(WatermarkError::Font(format!(
            "No font file for family {:?} in {}",
            family,
            self.directory.display()
        )))
    }
}

fn is_safe_family(family: &str) -> bool {
    let family = family.trim();
    !family.is_empty()
        && !family.contains(['/', '\\'])
        && !family.contains("..")
}
