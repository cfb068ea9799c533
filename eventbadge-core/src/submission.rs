//! Submission Pipeline
//!
//! One attempt per call. Offline: queue without touching the network.
//! Online: write once; any transport failure is queued with its reason.
//! Nothing here returns an error to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::queue::{OfflineQueue, PendingSubmission};
use crate::record::SubmissionPayload;
use crate::remote::{Acknowledgement, RemoteStore};

/// Last-known online/offline signal. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity(Arc<AtomicBool>);

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SubmissionOutcome {
    /// Online-Direct: the endpoint acknowledged the write.
    Delivered { acknowledgement: Acknowledgement },
    /// Offline-Queued: no write attempted.
    QueuedOffline { entry_id: Uuid },
    /// Direct-Failed-Queued: the write failed and was queued with its reason.
    QueuedAfterFailure { entry_id: Uuid, reason: String },
    /// The local queue could not be written either.
    NotSaved { reason: String },
}

impl SubmissionOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SubmissionOutcome::Delivered { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(
            self,
            SubmissionOutcome::QueuedOffline { .. } | SubmissionOutcome::QueuedAfterFailure { .. }
        )
    }

    /// Notice for the user, when one is warranted.
    pub fn user_notice(&self) -> Option<&'static str> {
        match self {
            SubmissionOutcome::Delivered { .. } => None,
            SubmissionOutcome::QueuedOffline { .. } => Some(
                "You're currently offline. Your registration was saved locally and will be synced when you're back online.",
            ),
            SubmissionOutcome::QueuedAfterFailure { .. } => Some(
                "Your registration was saved locally but couldn't be sent to the server. It will be synced when possible.",
            ),
            SubmissionOutcome::NotSaved { .. } => {
                Some("Your registration couldn't be sent or saved locally. Please try again.")
            }
        }
    }
}

pub struct SubmissionPipeline {
    store: Box<dyn RemoteStore>,
    queue: OfflineQueue,
}

impl SubmissionPipeline {
    pub fn new(store: Box<dyn RemoteStore>, queue: OfflineQueue) -> Self {
        Self { store, queue }
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    #[tracing::instrument(skip_all, fields(online = connectivity.is_online()))]
    pub async fn submit(&self, payload: SubmissionPayload, connectivity: &Connectivity) -> SubmissionOutcome {
        if !connectivity.is_online() {
            if let Err(e) = self.queue.set_latest(&payload) {
                warn!(error = %e, "could not update latest pending registration");
            }
            return self.enqueue(payload, None);
        }

        match self.store.write(&payload).await {
            Ok(acknowledgement) => {
                info!(status = acknowledgement.status, "registration delivered");
                SubmissionOutcome::Delivered { acknowledgement }
            }
            Err(e) => {
                warn!(error = %e, "registration write failed, queueing");
                self.enqueue(payload, Some(e.to_string()))
            }
        }
    }

    fn enqueue(&self, payload: SubmissionPayload, reason: Option<String>) -> SubmissionOutcome {
        let result = PendingSubmission::new(payload, reason.clone())
            .and_then(|entry| self.queue.append(&entry).map(|_| entry.id));
        match (result, reason) {
            (Ok(entry_id), None) => {
                info!(%entry_id, "registration queued while offline");
                SubmissionOutcome::QueuedOffline { entry_id }
            }
            (Ok(entry_id), Some(reason)) => SubmissionOutcome::QueuedAfterFailure { entry_id, reason },
            (Err(e), _) => {
                error!(error = %e, "failed to store registration in offline queue");
                SubmissionOutcome::NotSaved { reason: e.to_string() }
            }
        }
    }
}
