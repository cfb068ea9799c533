//! Artifact Exporter
//!
//! Download saves the badge through the host's save facility. Share hands
//! it to the host's share facility and falls back to download when there
//! is none.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::compositor::BadgeArtifact;
use crate::error::ExportError;

pub const SHARE_TITLE: &str = "My Event Participation Badge";
pub const SHARE_TEXT: &str = "I'm participating in the upcoming event! Check out my badge.";
pub const SHARE_UNSUPPORTED_NOTICE: &str =
    "Sharing is not supported here. Please download and share manually.";

const FILE_STEM: &str = "event-badge";

pub trait SaveFacility {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError>;
}

/// Saves into a fixed directory, creating it on first use.
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveFacility for DirectorySaver {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// An in-memory file handed to a share facility.
#[derive(Debug, Clone, Copy)]
pub struct SharePayload<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

pub trait ShareFacility {
    fn is_available(&self) -> bool;
    fn share(&self, payload: &SharePayload<'_>) -> Result<(), ExportError>;
}

/// Host without a share facility.
pub struct NoShareFacility;

impl ShareFacility for NoShareFacility {
    fn is_available(&self) -> bool {
        false
    }

    fn share(&self, _payload: &SharePayload<'_>) -> Result<(), ExportError> {
        Err(ExportError::Unsupported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "lowercase")]
pub enum ShareOutcome {
    Shared { file_name: String },
    Download { path: PathBuf, notice: String },
}

pub struct ArtifactExporter {
    saver: Box<dyn SaveFacility>,
    share: Box<dyn ShareFacility>,
}

impl ArtifactExporter {
    pub fn new(saver: Box<dyn SaveFacility>, share: Box<dyn ShareFacility>) -> Self {
        Self { saver, share }
    }

    pub fn download(&self, artifact: &BadgeArtifact, registrant_name: &str) -> Result<PathBuf, ExportError> {
        let file_name = download_file_name(registrant_name, artifact.format.extension());
        let path = self.saver.save(&file_name, artifact.bytes())?;
        info!(path = %path.display(), len = artifact.len(), "badge saved");
        Ok(path)
    }

    /// Share, or download when the host cannot share. A share the host
    /// rejects is returned as an error for the caller to surface.
    pub fn share(&self, artifact: &BadgeArtifact, registrant_name: &str) -> Result<ShareOutcome, ExportError> {
        let file_name = format!("{}.{}", FILE_STEM, artifact.format.extension());
        let payload = SharePayload {
            title: SHARE_TITLE,
            text: SHARE_TEXT,
            file_name: &file_name,
            mime_type: artifact.format.mime_type(),
            bytes: artifact.bytes(),
        };

        let result = if self.share.is_available() {
            self.share.share(&payload)
        } else {
            Err(ExportError::Unsupported)
        };

        match result {
            Ok(()) => {
                info!(%file_name, "badge shared");
                Ok(ShareOutcome::Shared { file_name })
            }
            Err(ExportError::Unsupported) => {
                warn!("share facility unavailable, downloading instead");
                let path = self.download(artifact, registrant_name)?;
                Ok(ShareOutcome::Download {
                    path,
                    notice: SHARE_UNSUPPORTED_NOTICE.to_string(),
                })
            }
            Err(e) => {
                warn!(error = %e, "share failed");
                Err(e)
            }
        }
    }
}

/// `event-badge-<name>.<ext>`, with characters unsafe in file names replaced.
pub fn download_file_name(registrant_name: &str, extension: &str) -> String {
    let cleaned: String = registrant_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        format!("{}.{}", FILE_STEM, extension)
    } else {
        format!("{}-{}.{}", FILE_STEM, cleaned, extension)
    }
}
