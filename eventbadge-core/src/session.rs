//! Session State
//!
//! Owns everything the wizard accumulates for one registrant. Passed by
//! reference to each step; lives only as long as the session.

use crate::compositor::BadgeArtifact;
use crate::error::IngestError;
use crate::photo::{self, PhotoReference, PhotoUpload};
use crate::record::{RecordPatch, RegistrationRecord};
use crate::submission::Connectivity;

#[derive(Debug)]
pub struct Session {
    record: RegistrationRecord,
    photo: Option<PhotoReference>,
    badge: Option<BadgeArtifact>,
    connectivity: Connectivity,
}

impl Session {
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            record: RegistrationRecord::default(),
            photo: None,
            badge: None,
            connectivity,
        }
    }

    pub fn record(&self) -> &RegistrationRecord {
        &self.record
    }

    pub fn update_record(&mut self, patch: RecordPatch) {
        self.record.merge(patch);
    }

    /// Photo chosen so far; `None` until ingestion succeeds or is skipped.
    pub fn photo(&self) -> Option<&PhotoReference> {
        self.photo.as_ref()
    }

    /// Photo to render: the ingested one, or the placeholder.
    pub fn photo_or_placeholder(&self) -> PhotoReference {
        self.photo.clone().unwrap_or_else(PhotoReference::placeholder)
    }

    pub fn set_photo(&mut self, photo: PhotoReference) {
        self.photo = Some(photo);
    }

    /// Ingest an upload; on rejection the current photo is kept.
    pub fn ingest_photo(&mut self, upload: &PhotoUpload) -> Result<&PhotoReference, IngestError> {
        let photo = photo::ingest(upload)?;
        Ok(&*self.photo.insert(photo))
    }

    /// Same as [`Session::ingest_photo`], resolving once the decode finishes.
    pub async fn ingest_photo_async(&mut self, upload: PhotoUpload) -> Result<&PhotoReference, IngestError> {
        let photo = photo::ingest_async(upload).await?;
        Ok(&*self.photo.insert(photo))
    }

    pub fn skip_photo(&mut self) {
        self.photo = Some(PhotoReference::placeholder());
    }

    pub fn photo_uploaded(&self) -> bool {
        self.photo.as_ref().map_or(false, PhotoReference::is_user_supplied)
    }

    pub fn badge(&self) -> Option<&BadgeArtifact> {
        self.badge.as_ref()
    }

    /// Replace the badge wholesale.
    pub fn set_badge(&mut self, badge: BadgeArtifact) -> &BadgeArtifact {
        self.badge.insert(badge)
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Connectivity::default())
    }
}
