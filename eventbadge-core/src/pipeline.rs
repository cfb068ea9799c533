//! Registration Pipeline - Single Entry Point
//!
//! complete_registration validates, composes, then submits, strictly in
//! that order. A failed compose leaves the previous badge in place and
//! submits nothing.

use serde::Serialize;
use tracing::info;

use crate::compositor::{BadgeArtifact, Compositor, Poster};
use crate::error::BadgeError;
use crate::record::{RegistrationRecord, SubmissionPayload};
use crate::session::Session;
use crate::submission::{SubmissionOutcome, SubmissionPipeline};
use crate::templates::{Template, TemplateRegistry};
use crate::validation::{ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub badge: BadgeArtifact,
    pub payload: SubmissionPayload,
    pub submission: SubmissionOutcome,
}

pub struct RegistrationPipeline {
    registry: TemplateRegistry,
    validator: Validator,
    compositor: Compositor,
    submission: SubmissionPipeline,
}

impl RegistrationPipeline {
    pub fn new(registry: TemplateRegistry, compositor: Compositor, submission: SubmissionPipeline) -> Self {
        Self {
            registry,
            validator: Validator::new(),
            compositor,
            submission,
        }
    }

    /// List all available templates
    pub fn list_templates(&self) -> Vec<&Template> {
        self.registry.list()
    }

    /// Get a specific template
    pub fn get_template(&self, id: &str) -> Option<&Template> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn submission(&self) -> &SubmissionPipeline {
        &self.submission
    }

    pub fn validate_record(&self, record: &RegistrationRecord) -> ValidationResult {
        self.validator.validate(record)
    }

    /// Compose the session's badge with `template_id`.
    ///
    /// `poster` overrides the template's own poster.
    pub fn generate_badge<'s>(
        &self,
        session: &'s mut Session,
        template_id: &str,
        poster: Option<&Poster>,
    ) -> Result<&'s BadgeArtifact, BadgeError> {
        let template = self.resolve_template(template_id)?;
        let poster = match poster {
            Some(p) => p.clone(),
            None => Poster::load(&template.poster)?,
        };

        let photo = session.photo_or_placeholder();
        let artifact = self.compositor.compose(template, &poster, &photo)?;
        Ok(session.set_badge(artifact))
    }

    /// Validate, compose and submit.
    ///
    /// Only validation, template and compositing problems are errors;
    /// delivery problems are reported through [`Completion::submission`].
    #[tracing::instrument(skip(self, session, poster))]
    pub async fn complete_registration(
        &self,
        session: &mut Session,
        template_id: &str,
        poster: Option<&Poster>,
    ) -> Result<Completion, BadgeError> {
        self.validate_record(session.record())
            .into_result()
            .map_err(BadgeError::Validation)?;

        let badge = self.generate_badge(session, template_id, poster)?.clone();

        let payload = SubmissionPayload::new(session.record().clone(), template_id, session.photo_uploaded());
        let submission = self.submission.submit(payload.clone(), session.connectivity()).await;
        info!(delivered = submission.is_delivered(), queued = submission.is_queued(), "registration complete");

        Ok(Completion { badge, payload, submission })
    }

    fn resolve_template(&self, template_id: &str) -> Result<&Template, BadgeError> {
        let template = self
            .registry
            .get(template_id)
            .ok_or_else(|| BadgeError::TemplateNotFound(template_id.to_string()))?;
        check_engine_version(template)?;
        Ok(template)
    }
}

fn check_engine_version(template: &Template) -> Result<(), BadgeError> {
    let mismatch = || {
        BadgeError::EngineVersionMismatch(
            template.id.clone(),
            template.engine_min_version.clone(),
            ENGINE_VERSION.to_string(),
        )
    };
    let engine_ver = semver::Version::parse(ENGINE_VERSION).map_err(|_| mismatch())?;
    let min_ver = semver::Version::parse(&template.engine_min_version).map_err(|_| mismatch())?;
    if engine_ver < min_ver {
        return Err(mismatch());
    }
    Ok(())
}
