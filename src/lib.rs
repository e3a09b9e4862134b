use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod directory_batch;
pub mod settings;
pub mod startup_checks;
pub mod upload;
pub mod watermark;

use settings::SettingsConfig;
use watermark::OutputFormat;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FontConfig {
    pub directory: PathBuf,
    pub default_family: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub jpeg_quality: Option<u8>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "sukashi".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("static"),
            default_family: "DejaVuSans".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            jpeg_quality: Some(watermark::DEFAULT_JPEG_QUALITY),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }
        let config_content = std::fs::read_to_string(path)?;
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.fonts.directory, PathBuf::from("static"));
        assert_eq!(config.output.format, OutputFormat::Jpeg);
        assert_eq!(config.output.jpeg_quality, Some(90));
        assert_eq!(
            config.settings,
            SettingsConfig::File {
                path: PathBuf::from("watermark-settings.json")
            }
        );
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[app]
name = "studio"
log_level = "debug"

[fonts]
directory = "fonts"
default_family = "Inter"

[output]
format = "png"

[settings]
backend = "memory"
"#;
        let config: Config = toml_edit::de::from_str(toml).unwrap();
        assert_eq!(config.app.name, "studio");
        assert_eq!(config.fonts.default_family, "Inter");
        assert_eq!(config.output.format, OutputFormat::Png);
        assert_eq!(config.output.jpeg_quality, None);
        assert_eq!(config.settings, SettingsConfig::Memory);
    }

    #[test]
    fn test_config_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.app.name, "sukashi");
    }

    #[test]
    fn test_config_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sukashi.toml");
        std::fs::write(
            &path,
            "[settings]\nbackend = \"file\"\npath = \"/tmp/wm.json\"\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.settings,
            SettingsConfig::File {
                path: PathBuf::from("/tmp/wm.json")
            }
        );
        assert_eq!(config.output.format, OutputFormat::Jpeg);
    }
}
