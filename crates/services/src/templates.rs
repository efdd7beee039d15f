use std::sync::Arc;

use audit_core::model::{OrganizationId, Section, Template, TemplateId};
use storage::repository::{SessionRepository, TemplateRepository};

use crate::Clock;
use crate::error::{AuditError, ValidationError};

/// Authoring and lookup of audit templates.
#[derive(Clone)]
pub struct TemplateService {
    clock: Clock,
    templates: Arc<dyn TemplateRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl TemplateService {
    #[must_use]
    pub fn new(
        clock: Clock,
        templates: Arc<dyn TemplateRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            templates,
            sessions,
        }
    }

    /// Validate and store a new template.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Validation` for a blank name or bad question ids.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn create(
        &self,
        organization_id: OrganizationId,
        name: String,
        category: String,
        sections: Vec<Section>,
    ) -> Result<Template, AuditError> {
        let template = Template::new(
            TemplateId::generate(),
            organization_id,
            name,
            category,
            sections,
            self.clock.now(),
        )?;
        self.templates.upsert_template(&template).await?;
        tracing::info!(
            template_id = %template.id(),
            questions = template.question_count(),
            "template created"
        );
        Ok(template)
    }

    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the template is missing or belongs to
    /// another organization.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn get(
        &self,
        organization_id: OrganizationId,
        template_id: TemplateId,
    ) -> Result<Template, AuditError> {
        load_template(self.templates.as_ref(), organization_id, template_id).await
    }

    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn list(&self, organization_id: OrganizationId) -> Result<Vec<Template>, AuditError> {
        Ok(self.templates.list_templates(organization_id).await?)
    }

    /// Replace a template's name, category and sections.
    ///
    /// Refused once any session references the template, so in-flight audits
    /// are never reinterpreted against a different question set.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the template does not exist.
    /// Returns `AuditError::Validation` if sessions exist or the new content is
    /// invalid.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn update(
        &self,
        organization_id: OrganizationId,
        template_id: TemplateId,
        name: String,
        category: String,
        sections: Vec<Section>,
    ) -> Result<Template, AuditError> {
        let mut template =
            load_template(self.templates.as_ref(), organization_id, template_id).await?;

        let sessions = self.sessions.count_sessions_for_template(template_id).await?;
        if sessions > 0 {
            return Err(ValidationError::TemplateInUse {
                id: template_id,
                sessions,
            }
            .into());
        }

        template.revise(name, category, sections, self.clock.now())?;
        self.templates.upsert_template(&template).await?;
        tracing::info!(
            template_id = %template_id,
            version = template.version(),
            "template revised"
        );
        Ok(template)
    }

    /// Toggle whether new sessions may be launched from the template.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the template does not exist.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn set_active(
        &self,
        organization_id: OrganizationId,
        template_id: TemplateId,
        active: bool,
    ) -> Result<Template, AuditError> {
        let mut template =
            load_template(self.templates.as_ref(), organization_id, template_id).await?;
        template.set_active(active, self.clock.now());
        self.templates.upsert_template(&template).await?;
        Ok(template)
    }
}

pub(crate) async fn load_template(
    templates: &dyn TemplateRepository,
    organization_id: OrganizationId,
    template_id: TemplateId,
) -> Result<Template, AuditError> {
    templates
        .get_template(template_id)
        .await?
        .filter(|t| t.organization_id() == organization_id)
        .ok_or_else(|| AuditError::not_found("template", template_id))
}
