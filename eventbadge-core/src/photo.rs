//! Photo Ingestion
//!
//! Accepts an uploaded image, enforces the size and content-type limits,
//! and decodes it into a rendering source for the compositor.

use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::IngestError;

/// 5 MiB
pub const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

pub const PLACEHOLDER_URI: &str = "https://via.placeholder.com/300x300?text=No+Photo";
const PLACEHOLDER_SIZE: u32 = 300;
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0xCC, 0xCC, 0xCC, 0xFF]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    User,
    Placeholder,
}

/// A user-selected file as it arrives from the host environment.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl PhotoUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self { bytes, content_type: content_type.into() }
    }

    /// Read a file, declaring its content type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        let bytes = std::fs::read(path)?;
        let content_type = ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Self { bytes, content_type })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Decoded photo plus the URI it is displayed under.
#[derive(Debug, Clone)]
pub struct PhotoReference {
    uri: String,
    image: Arc<RgbaImage>,
    provenance: Provenance,
}

impl PhotoReference {
    pub fn placeholder() -> Self {
        Self {
            uri: PLACEHOLDER_URI.to_string(),
            image: Arc::new(RgbaImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, PLACEHOLDER_FILL)),
            provenance: Provenance::Placeholder,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_user_supplied(&self) -> bool {
        self.provenance == Provenance::User
    }
}

impl PartialEq for PhotoReference {
    fn eq(&self, other: &Self) -> bool {
        self.provenance == other.provenance && self.uri == other.uri
    }
}

/// Validate and decode an upload. Checks run before any decoding work.
pub fn ingest(upload: &PhotoUpload) -> Result<PhotoReference, IngestError> {
    check_upload(upload)?;

    let decoded = image::load_from_memory(&upload.bytes).map_err(|e| {
        warn!(error = %e, "photo decode failed");
        IngestError::Decode(e.to_string())
    })?;
    let image = decoded.to_rgba8();
    debug!(width = image.width(), height = image.height(), "photo decoded");

    let uri = format!(
        "data:{};base64,{}",
        upload.content_type.trim(),
        base64::engine::general_purpose::STANDARD.encode(&upload.bytes)
    );

    Ok(PhotoReference {
        uri,
        image: Arc::new(image),
        provenance: Provenance::User,
    })
}

/// Same as [`ingest`], with decoding moved off the calling task.
pub async fn ingest_async(upload: PhotoUpload) -> Result<PhotoReference, IngestError> {
    check_upload(&upload)?;
    tokio::task::spawn_blocking(move || ingest(&upload))
        .await
        .map_err(|e| IngestError::Decode(e.to_string()))?
}

fn check_upload(upload: &PhotoUpload) -> Result<(), IngestError> {
    if upload.size() > MAX_PHOTO_BYTES {
        return Err(IngestError::FileTooLarge {
            size: upload.size(),
            limit: MAX_PHOTO_BYTES,
        });
    }
    if !is_image_content_type(&upload.content_type) {
        return Err(IngestError::InvalidImageType(upload.content_type.clone()));
    }
    Ok(())
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("image/")
}
