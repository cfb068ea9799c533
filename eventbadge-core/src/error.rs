//! Error Taxonomy
//!
//! Validation errors stay local to the step that raised them.
//! Rasterization errors abort the current generate/export action.
//! Transport errors are absorbed by the submission pipeline and never reach callers.
//! Unsupported features trigger a fallback rather than a failure.

use thiserror::Error;

use crate::validation::FieldViolation;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Invalid image type: {0}")]
    InvalidImageType(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Could not read photo: {0}")]
    Read(#[from] std::io::Error),
}

impl IngestError {
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::FileTooLarge { .. } => "Image too large. Please select an image under 5MB.",
            IngestError::InvalidImageType(_) | IngestError::Decode(_) | IngestError::Read(_) => {
                "Please select a valid image file."
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RasterizationError {
    #[error("Poster decode failed: {0}")]
    PosterDecode(String),

    #[error("Invalid layout: {0}")]
    Layout(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No submission endpoint configured")]
    NotConfigured,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Endpoint returned status {0}")]
    Status(u16),

    #[error("Endpoint rejected submission: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Share facility unavailable")]
    Unsupported,

    #[error("Share rejected: {0}")]
    ShareRejected(String),

    #[error("Save failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Crate-level error for callers that drive the whole wizard
#[derive(Debug, Error)]
pub enum BadgeError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Rasterization(#[from] RasterizationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),
}

impl BadgeError {
    /// One-line message suitable for showing next to the failed action.
    pub fn user_message(&self) -> String {
        match self {
            BadgeError::Validation(violations) => violations
                .first()
                .map(|v| v.message.clone())
                .unwrap_or_else(|| "Please check your details.".to_string()),
            BadgeError::Ingest(e) => e.user_message().to_string(),
            BadgeError::Rasterization(_) => "Failed to generate badge. Please try again.".to_string(),
            BadgeError::Export(ExportError::Unsupported) => {
                "Sharing is not supported here. Please download and share manually.".to_string()
            }
            BadgeError::Export(_) => "Failed to share badge. Please try downloading instead.".to_string(),
            BadgeError::Queue(_) => "Your registration could not be saved locally.".to_string(),
            BadgeError::TemplateNotFound(_) | BadgeError::EngineVersionMismatch(..) => {
                "The selected badge template is unavailable.".to_string()
            }
        }
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}
