use std::sync::Arc;

use audit_core::flatten;
use audit_core::model::{NarrativeReport, OrganizationId, SessionId};
use audit_core::progress::classify;
use storage::repository::{ReportRepository, SessionRepository, TemplateRepository};

use super::client::CompletionClient;
use super::prompt::build_prompt;
use crate::Clock;
use crate::error::{AuditError, DependencyError};
use crate::ledger::ResponseLedger;
use crate::sessions::load_session;
use crate::templates::load_template;

/// Generates and stores one narrative report per session.
#[derive(Clone)]
pub struct ReportService {
    clock: Clock,
    templates: Arc<dyn TemplateRepository>,
    sessions: Arc<dyn SessionRepository>,
    reports: Arc<dyn ReportRepository>,
    ledger: ResponseLedger,
    client: Arc<dyn CompletionClient>,
}

impl ReportService {
    #[must_use]
    pub fn new(
        clock: Clock,
        templates: Arc<dyn TemplateRepository>,
        sessions: Arc<dyn SessionRepository>,
        reports: Arc<dyn ReportRepository>,
        ledger: ResponseLedger,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            clock,
            templates,
            sessions,
            reports,
            ledger,
            client,
        }
    }

    /// Return the session's report, generating and storing it on first use.
    ///
    /// An existing report is returned verbatim without calling the completion
    /// service again.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the session or its template is missing.
    /// Returns `AuditError::Dependency` if the completion service fails; nothing
    /// is stored in that case.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn generate(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Result<NarrativeReport, AuditError> {
        let session = load_session(self.sessions.as_ref(), organization_id, session_id).await?;
        if let Some(existing) = self.reports.get_report(session_id).await? {
            tracing::debug!(session_id = %session_id, "returning stored report");
            return Ok(existing);
        }

        let template =
            load_template(self.templates.as_ref(), organization_id, session.template_id()).await?;
        let questions = flatten(&template);
        let responses = self.ledger.list_by_session(session_id).await?;
        let prompt = build_prompt(&session, &classify(&responses, &questions));

        let content = self.client.complete(&prompt).await.map_err(|e| {
            tracing::warn!(session_id = %session_id, error = %e, "report generation failed");
            AuditError::Dependency(DependencyError::Report(e))
        })?;

        let report = NarrativeReport {
            session_id,
            organization_id,
            content,
            model: self.client.model(),
            created_at: self.clock.now(),
        };
        let stored = self.reports.insert_report(&report).await?;
        tracing::info!(session_id = %session_id, chars = stored.content.len(), "report generated");
        Ok(stored)
    }

    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the session is missing.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn get(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Result<Option<NarrativeReport>, AuditError> {
        load_session(self.sessions.as_ref(), organization_id, session_id).await?;
        Ok(self.reports.get_report(session_id).await?)
    }
}
