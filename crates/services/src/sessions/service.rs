use std::sync::Arc;

use chrono::NaiveDate;
use url::Url;

use audit_core::flatten;
use audit_core::model::{
    AuditSession, AuditorRef, OrganizationId, QuestionId, Response, ResponsePatch, SessionId,
    SessionStatus, TemplateId,
};
use audit_core::progress::{ProgressSnapshot, recompute};
use storage::repository::{ReportRepository, SessionQuery, SessionRepository, TemplateRepository};

use crate::Clock;
use crate::error::{AuditError, DependencyError, NotifyError, ValidationError};
use crate::ledger::ResponseLedger;
use crate::notify::{AssignmentNotice, Notifier};
use crate::templates::load_template;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of launching a session.
///
/// A failed notification does not fail the launch; it is reported in
/// `notification_warning`.
#[derive(Debug)]
pub struct LaunchOutcome {
    pub session: AuditSession,
    pub access_url: Url,
    pub notification_warning: Option<DependencyError>,
}

/// Result of recording one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub response: Response,
    pub snapshot: ProgressSnapshot,
    pub session: AuditSession,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Orchestrates the session lifecycle: launch, answering, finalize, delete.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    templates: Arc<dyn TemplateRepository>,
    sessions: Arc<dyn SessionRepository>,
    reports: Arc<dyn ReportRepository>,
    ledger: ResponseLedger,
    notifier: Arc<dyn Notifier>,
    public_base_url: Url,
}

impl SessionService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        templates: Arc<dyn TemplateRepository>,
        sessions: Arc<dyn SessionRepository>,
        reports: Arc<dyn ReportRepository>,
        ledger: ResponseLedger,
        notifier: Arc<dyn Notifier>,
        public_base_url: Url,
    ) -> Self {
        Self {
            clock,
            templates,
            sessions,
            reports,
            ledger,
            notifier,
            public_base_url,
        }
    }

    /// Create a pending session for a template and notify the auditor.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the template does not exist.
    /// Returns `AuditError::Validation` for a blank department or auditor name,
    /// or an inactive template.
    /// Returns `AuditError::Persistence` if the session cannot be stored.
    pub async fn launch(
        &self,
        organization_id: OrganizationId,
        template_id: TemplateId,
        auditor: AuditorRef,
        department: String,
        due_date: NaiveDate,
    ) -> Result<LaunchOutcome, AuditError> {
        let template =
            load_template(self.templates.as_ref(), organization_id, template_id).await?;
        let session = AuditSession::launch(
            SessionId::generate(),
            &template,
            auditor,
            department,
            due_date,
            self.clock.now(),
        )?;
        self.sessions.insert_session(&session).await?;
        tracing::info!(
            session_id = %session.id(),
            template_id = %template_id,
            department = session.department(),
            "session launched"
        );

        let access_url = self.access_url(session.id());
        let notification_warning = self
            .notify_assignment(&session, &access_url)
            .await
            .err()
            .map(|e| {
                tracing::warn!(session_id = %session.id(), error = %e, "assignment notification failed");
                DependencyError::Notify(e)
            });

        Ok(LaunchOutcome {
            session,
            access_url,
            notification_warning,
        })
    }

    /// Direct link an auditor uses to open the session.
    #[must_use]
    pub fn access_url(&self, session_id: SessionId) -> Url {
        let mut url = self.public_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("execute")
                .push(&session_id.to_string());
        }
        url
    }

    async fn notify_assignment(
        &self,
        session: &AuditSession,
        access_url: &Url,
    ) -> Result<(), NotifyError> {
        let auditor = session.auditor();
        let recipient = auditor
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(NotifyError::MissingRecipient)?;

        let notice = AssignmentNotice {
            recipient: recipient.to_owned(),
            auditor_name: auditor.name.clone(),
            template_name: session.template_name().to_owned(),
            access_url: access_url.to_string(),
        };
        self.notifier.notify(&notice).await
    }

    /// Record an answer, then recompute and store the session's progress.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Validation` for an empty patch or a completed
    /// session.
    /// Returns `AuditError::NotFound` if the session, its template, or the
    /// question does not exist.
    /// Returns `AuditError::Persistence` if a store read or write fails. The
    /// response may already be saved when the session update fails; repeating
    /// the call is safe.
    pub async fn answer(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
        question_id: QuestionId,
        patch: &ResponsePatch,
    ) -> Result<AnswerOutcome, AuditError> {
        patch.validate()?;
        let mut session = load_session(self.sessions.as_ref(), organization_id, session_id).await?;
        if session.is_locked() {
            return Err(ValidationError::SessionLocked(session_id).into());
        }

        let template =
            load_template(self.templates.as_ref(), organization_id, session.template_id()).await?;
        let questions = flatten(&template);
        if !questions.iter().any(|q| q.id() == &question_id) {
            return Err(AuditError::not_found("question", &question_id));
        }

        let response = self
            .ledger
            .upsert(organization_id, session_id, question_id, patch)
            .await?;

        let rows = self.ledger.list_by_session(session_id).await?;
        let snapshot = recompute(&session, &questions, &rows);
        let before = session.status();
        session.apply_progress(&snapshot, self.clock.now());
        self.sessions.update_session(&session).await.map_err(|e| {
            tracing::warn!(session_id = %session_id, error = %e, "failed to store session progress");
            e
        })?;

        if before != session.status() {
            tracing::info!(
                session_id = %session_id,
                from = before.as_str(),
                to = session.status().as_str(),
                progress = session.progress(),
                "session status changed"
            );
        }

        Ok(AnswerOutcome {
            response,
            snapshot,
            session,
        })
    }

    /// Submit the session, forcing `Completed` regardless of progress.
    ///
    /// Finalizing an already completed session returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the session or its template is missing.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn finalize(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Result<AuditSession, AuditError> {
        let mut session = load_session(self.sessions.as_ref(), organization_id, session_id).await?;
        if session.is_locked() {
            tracing::debug!(session_id = %session_id, "session already completed");
            return Ok(session);
        }

        let template =
            load_template(self.templates.as_ref(), organization_id, session.template_id()).await?;
        let rows = self.ledger.list_by_session(session_id).await?;
        let snapshot = recompute(&session, &flatten(&template), &rows);

        let now = self.clock.now();
        session.apply_progress(&snapshot, now);
        session.finalize(now);
        self.sessions.update_session(&session).await?;
        tracing::info!(
            session_id = %session_id,
            progress = session.progress(),
            "session finalized"
        );
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the session is missing.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn get(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Result<AuditSession, AuditError> {
        load_session(self.sessions.as_ref(), organization_id, session_id).await
    }

    /// Sessions of an organization, newest first, optionally filtered by
    /// status and capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn list(
        &self,
        organization_id: OrganizationId,
        status: Option<SessionStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<AuditSession>, AuditError> {
        let mut query = SessionQuery::for_organization(organization_id);
        if let Some(status) = status {
            query = query.with_status(status);
        }
        if let Some(limit) = limit {
            query = query.with_limit(limit);
        }
        Ok(self.sessions.list_sessions(&query).await?)
    }

    /// Remove a session together with its responses and report.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the session is missing.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn delete(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Result<(), AuditError> {
        load_session(self.sessions.as_ref(), organization_id, session_id).await?;

        let responses = self.ledger.purge_session(session_id).await?;
        self.reports.delete_report(session_id).await?;
        if !self.sessions.delete_session(session_id).await? {
            return Err(AuditError::not_found("session", session_id));
        }
        tracing::info!(session_id = %session_id, responses, "session deleted");
        Ok(())
    }

    pub(crate) fn templates(&self) -> &dyn TemplateRepository {
        self.templates.as_ref()
    }

    pub(crate) fn sessions(&self) -> &dyn SessionRepository {
        self.sessions.as_ref()
    }

    pub(crate) fn ledger(&self) -> &ResponseLedger {
        &self.ledger
    }

    pub(crate) fn clock(&self) -> Clock {
        self.clock
    }
}

pub(crate) async fn load_session(
    sessions: &dyn SessionRepository,
    organization_id: OrganizationId,
    session_id: SessionId,
) -> Result<AuditSession, AuditError> {
    sessions
        .get_session(session_id)
        .await?
        .filter(|s| s.organization_id() == organization_id)
        .ok_or_else(|| AuditError::not_found("session", session_id))
}
