use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    SerdeError(#[from] serde_json::Error),
}
