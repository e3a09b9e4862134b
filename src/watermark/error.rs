use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Failed to decode source image: {0}")]
    SourceDecode(String),

    #[error("Failed to decode overlay image: {0}")]
    OverlayDecode(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Encode error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WatermarkError {
    /// True for the two decode failures a caller may want to branch on
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            WatermarkError::SourceDecode(_) | WatermarkError::OverlayDecode(_)
        )
    }
}
