use pixel_pipeline::{DrawingError, ParseColorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown quantizer: {0}")]
    UnknownQuantizer(String),

    #[error("Unknown ditherer: {0}")]
    UnknownDitherer(String),

    #[error("Invalid color: {0}")]
    Color(#[from] ParseColorError),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("Pipeline error: {0}")]
    Drawing(#[from] DrawingError),

    #[error("Report encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
