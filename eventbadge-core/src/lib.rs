//! Event Badge Core - badge compositing and resilient registration submission
//!
//! # Guarantees
//! 1. Photos over 5 MiB or without an image content type never reach the session
//! 2. Badge layout is fractional, so one template renders at any width up to `MAX_CANVAS_SIDE`
//! 3. Composing twice with the same inputs yields identical bytes
//! 4. A failed compose never replaces the previous badge
//! 5. Submission never fails the flow: undelivered records land in the offline queue

pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod hashing;
pub mod photo;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod remote;
pub mod session;
pub mod submission;
pub mod templates;
pub mod validation;

pub use compositor::{BadgeArtifact, Compositor, Poster};
pub use config::Config;
pub use error::{BadgeError, ExportError, IngestError, QueueError, RasterizationError, TransportError};
pub use export::{ArtifactExporter, DirectorySaver, NoShareFacility, SaveFacility, ShareFacility, ShareOutcome};
pub use photo::{PhotoReference, PhotoUpload, Provenance};
pub use pipeline::{Completion, RegistrationPipeline};
pub use queue::{OfflineQueue, PendingSubmission};
pub use record::{RecordPatch, RegistrationRecord, SubmissionPayload};
pub use remote::{Acknowledgement, HttpStore, RemoteStore};
pub use session::Session;
pub use submission::{Connectivity, SubmissionOutcome, SubmissionPipeline};
pub use templates::{PosterSource, Template, TemplateId, TemplateRegistry, DEFAULT_TEMPLATE_ID, MAX_CANVAS_SIDE};
pub use validation::{FieldViolation, ValidationResult, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
