use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use audit_core::flatten::{FlatQuestion, flatten};
use audit_core::model::{
    AuditSession, Finding, FindingResolution, FindingSeverity, OrganizationId, ResponseId,
    SessionId,
};
use storage::repository::{SessionRepository, TemplateRepository};

use crate::error::AuditError;
use crate::ledger::ResponseLedger;

/// Optional narrowing of the findings list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingFilter {
    pub resolution: Option<FindingResolution>,
    pub severity: Option<FindingSeverity>,
    pub session_id: Option<SessionId>,
}

impl FindingFilter {
    #[must_use]
    pub fn with_resolution(mut self, resolution: FindingResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: FindingSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn for_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    fn matches(&self, finding: &Finding) -> bool {
        self.resolution.is_none_or(|r| r == finding.resolution)
            && self.severity.is_none_or(|s| s == finding.severity)
            && self.session_id.is_none_or(|id| id == finding.session_id)
    }
}

/// Organization-wide view of warnings and non-compliances.
#[derive(Clone)]
pub struct FindingService {
    templates: Arc<dyn TemplateRepository>,
    sessions: Arc<dyn SessionRepository>,
    ledger: ResponseLedger,
}

struct SessionContext {
    session: AuditSession,
    questions: Vec<FlatQuestion>,
}

impl FindingService {
    #[must_use]
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        sessions: Arc<dyn SessionRepository>,
        ledger: ResponseLedger,
    ) -> Self {
        Self {
            templates,
            sessions,
            ledger,
        }
    }

    /// Findings enriched with question and session details, newest first.
    ///
    /// Rows whose session, template or question can no longer be resolved are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn list(
        &self,
        organization_id: OrganizationId,
        filter: &FindingFilter,
    ) -> Result<Vec<Finding>, AuditError> {
        let rows = self.ledger.list_findings(organization_id).await?;
        let mut contexts: HashMap<SessionId, Option<SessionContext>> = HashMap::new();
        let mut out = Vec::new();

        for row in &rows {
            if filter.session_id.is_some_and(|id| id != row.session_id) {
                continue;
            }
            let context = match contexts.entry(row.session_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => slot.insert(self.load_context(row.session_id).await?),
            };
            let Some(context) = context else {
                continue;
            };
            let Some(question) = context.questions.iter().find(|q| q.id() == &row.question_id)
            else {
                tracing::warn!(
                    session_id = %row.session_id,
                    question_id = %row.question_id,
                    "finding refers to a question not in the template"
                );
                continue;
            };
            if let Some(finding) = Finding::from_parts(row, question, &context.session) {
                if filter.matches(&finding) {
                    out.push(finding);
                }
            }
        }
        Ok(out)
    }

    async fn load_context(&self, session_id: SessionId) -> Result<Option<SessionContext>, AuditError> {
        let Some(session) = self.sessions.get_session(session_id).await? else {
            tracing::warn!(session_id = %session_id, "finding refers to a missing session");
            return Ok(None);
        };
        let Some(template) = self.templates.get_template(session.template_id()).await? else {
            tracing::warn!(
                session_id = %session_id,
                template_id = %session.template_id(),
                "finding refers to a missing template"
            );
            return Ok(None);
        };
        Ok(Some(SessionContext {
            questions: flatten(&template),
            session,
        }))
    }

    /// Flip a finding between `Open` and `Resolved`.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the response does not exist.
    /// Returns `AuditError::Validation` if it is not a finding.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn toggle_resolution(
        &self,
        organization_id: OrganizationId,
        response_id: ResponseId,
    ) -> Result<FindingResolution, AuditError> {
        self.ledger
            .toggle_resolution(organization_id, response_id)
            .await
    }
}
