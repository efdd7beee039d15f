//! Response ledger: one authoritative row per (session, question).

use std::sync::Arc;

use audit_core::model::{
    FindingResolution, OrganizationId, QuestionId, Response, ResponseError, ResponseId,
    ResponsePatch, SessionId,
};
use storage::repository::{ResponseRepository, SessionRepository};

use crate::Clock;
use crate::error::{AuditError, ValidationError};
use crate::sessions::load_session;

#[derive(Clone)]
pub struct ResponseLedger {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl ResponseLedger {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            clock,
            sessions,
            responses,
        }
    }

    /// Merge `patch` onto the stored answer for `(session_id, question_id)` and
    /// write the result.
    ///
    /// Fields the patch leaves unset keep their stored value, so a status-only
    /// write never clears notes and vice versa. Repeating the same call leaves
    /// a single row with the same values.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Validation` for a blank question id or empty patch,
    /// before anything is read or written.
    /// Returns `AuditError::NotFound` if the session does not exist in this
    /// organization; nothing is written in that case.
    /// Returns `AuditError::Persistence` if the store read or write fails.
    pub async fn upsert(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
        question_id: QuestionId,
        patch: &ResponsePatch,
    ) -> Result<Response, AuditError> {
        if question_id.is_blank() {
            return Err(ResponseError::EmptyQuestionId.into());
        }
        patch.validate()?;
        load_session(self.sessions.as_ref(), organization_id, session_id).await?;

        let current = self.responses.get_response(session_id, &question_id).await?;
        let row = Response::merged(
            current.as_ref(),
            ResponseId::generate(),
            organization_id,
            session_id,
            question_id,
            patch,
            self.clock.now(),
        )?;

        let stored = self.responses.upsert_response(&row).await.map_err(|e| {
            tracing::warn!(
                session_id = %session_id,
                question_id = %row.question_id,
                error = %e,
                "failed to save response"
            );
            e
        })?;
        tracing::debug!(
            session_id = %session_id,
            question_id = %stored.question_id,
            status = stored.status.as_ref().map_or("", |s| s.as_str()),
            "response saved"
        );
        Ok(stored)
    }

    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if the store read fails.
    pub async fn get(
        &self,
        session_id: SessionId,
        question_id: &QuestionId,
    ) -> Result<Option<Response>, AuditError> {
        Ok(self.responses.get_response(session_id, question_id).await?)
    }

    /// All rows recorded for a session.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if the store read fails.
    pub async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<Response>, AuditError> {
        Ok(self.responses.list_by_session(session_id).await?)
    }

    /// Warning and non-compliance rows across an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if the store read fails.
    pub async fn list_findings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Response>, AuditError> {
        Ok(self.responses.list_findings(organization_id).await?)
    }

    /// Flip a finding between `Open` and `Resolved`, leaving status and notes
    /// untouched. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the response does not exist in this
    /// organization.
    /// Returns `AuditError::Validation` if the response is not a warning or
    /// non-compliance.
    /// Returns `AuditError::Persistence` if the store fails.
    pub async fn toggle_resolution(
        &self,
        organization_id: OrganizationId,
        response_id: ResponseId,
    ) -> Result<FindingResolution, AuditError> {
        let response = self
            .responses
            .get_response_by_id(response_id)
            .await?
            .filter(|r| r.organization_id == organization_id)
            .ok_or_else(|| AuditError::not_found("response", response_id))?;

        if response.severity().is_none() {
            return Err(ValidationError::NotAFinding(response_id).into());
        }

        let next = response.resolution.toggled();
        self.responses.set_resolution(response_id, next).await?;
        tracing::info!(
            response_id = %response_id,
            resolution = next.as_str(),
            "finding resolution changed"
        );
        Ok(next)
    }

    /// Drop every row for a session. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if the store fails.
    pub async fn purge_session(&self, session_id: SessionId) -> Result<u64, AuditError> {
        Ok(self.responses.delete_for_session(session_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::model::{
        AuditSession, AuditorId, AuditorRef, Question, QuestionKind, ResponseStatus, Section,
        Template, TemplateId,
    };
    use audit_core::time::{fixed_clock, fixed_now};
    use chrono::NaiveDate;
    use storage::repository::InMemoryRepository;

    /// A ledger over an in-memory store holding one launched session.
    async fn ledger() -> (ResponseLedger, OrganizationId, SessionId) {
        let repo = InMemoryRepository::new();
        let org = OrganizationId::generate();
        let template = Template::new(
            TemplateId::generate(),
            org,
            "Loading bay",
            "Safety",
            vec![Section::new(
                "Dock",
                vec![
                    Question::new("q1", "Dock plates secured?", QuestionKind::YesNo),
                    Question::new("q2", "Lighting working?", QuestionKind::YesNo),
                ],
            )],
            fixed_now(),
        )
        .unwrap();
        let session = AuditSession::launch(
            SessionId::generate(),
            &template,
            AuditorRef {
                id: AuditorId::generate(),
                name: "Kim".into(),
                email: None,
            },
            "Warehouse",
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            fixed_now(),
        )
        .unwrap();
        repo.insert_session(&session).await.unwrap();

        let ledger = ResponseLedger::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo));
        (ledger, org, session.id())
    }

    #[tokio::test]
    async fn repeated_upsert_is_idempotent() {
        let (ledger, org, session) = ledger().await;
        let patch = ResponsePatch::status(ResponseStatus::Warning).with_notes("loose cable");

        let first = ledger
            .upsert(org, session, QuestionId::new("q1"), &patch)
            .await
            .unwrap();
        let second = ledger
            .upsert(org, session, QuestionId::new("q1"), &patch)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, Some(ResponseStatus::Warning));
        assert_eq!(second.notes.as_deref(), Some("loose cable"));
        assert_eq!(ledger.list_by_session(session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_updates_keep_the_other_field() {
        let (ledger, org, session) = ledger().await;
        let q = QuestionId::new("q1");

        ledger
            .upsert(org, session, q.clone(), &ResponsePatch::status(ResponseStatus::Warning))
            .await
            .unwrap();
        ledger
            .upsert(org, session, q.clone(), &ResponsePatch::notes("x"))
            .await
            .unwrap();

        let row = ledger.get(session, &q).await.unwrap().expect("row");
        assert_eq!(row.status, Some(ResponseStatus::Warning));
        assert_eq!(row.notes.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let (ledger, org, session) = ledger().await;
        let q = QuestionId::new("q1");

        ledger
            .upsert(org, session, q.clone(), &ResponsePatch::status(ResponseStatus::Compliance).with_notes("first"))
            .await
            .unwrap();
        ledger
            .upsert(org, session, q.clone(), &ResponsePatch::status(ResponseStatus::NonCompliance).with_notes("second"))
            .await
            .unwrap();

        let rows = ledger.list_by_session(session).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Some(ResponseStatus::NonCompliance));
        assert_eq!(rows[0].notes.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn rejects_empty_input_before_writing() {
        let (ledger, org, session) = ledger().await;

        let err = ledger
            .upsert(org, session, QuestionId::new("q1"), &ResponsePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation(ValidationError::Response(ResponseError::EmptyPatch))));

        let err = ledger
            .upsert(org, session, QuestionId::new("  "), &ResponsePatch::notes("n"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation(_)));
        assert!(ledger.list_by_session(session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_resolution_flips_findings_only() {
        let (ledger, org, session) = ledger().await;

        let finding = ledger
            .upsert(org, session, QuestionId::new("q1"), &ResponsePatch::status(ResponseStatus::NonCompliance).with_notes("n"))
            .await
            .unwrap();
        assert_eq!(
            ledger.toggle_resolution(org, finding.id).await.unwrap(),
            FindingResolution::Resolved
        );
        assert_eq!(
            ledger.toggle_resolution(org, finding.id).await.unwrap(),
            FindingResolution::Open
        );
        let row = ledger.get(session, &QuestionId::new("q1")).await.unwrap().unwrap();
        assert_eq!(row.status, Some(ResponseStatus::NonCompliance));
        assert_eq!(row.notes.as_deref(), Some("n"));

        let compliant = ledger
            .upsert(org, session, QuestionId::new("q2"), &ResponsePatch::status(ResponseStatus::Compliance))
            .await
            .unwrap();
        assert!(matches!(
            ledger.toggle_resolution(org, compliant.id).await,
            Err(AuditError::Validation(ValidationError::NotAFinding(_)))
        ));
        assert!(matches!(
            ledger.toggle_resolution(OrganizationId::generate(), finding.id).await,
            Err(AuditError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_requires_a_session_in_the_organization() {
        let (ledger, org, session) = ledger().await;
        let patch = ResponsePatch::status(ResponseStatus::Compliance);

        let ghost = SessionId::generate();
        let err = ledger
            .upsert(org, ghost, QuestionId::new("q1"), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::NotFound { entity: "session", .. }));
        assert!(ledger.list_by_session(ghost).await.unwrap().is_empty());

        let err = ledger
            .upsert(OrganizationId::generate(), session, QuestionId::new("q1"), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::NotFound { entity: "session", .. }));
        assert!(ledger.list_by_session(session).await.unwrap().is_empty());
    }
}
