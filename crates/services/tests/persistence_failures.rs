use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use audit_core::model::{
    AuditSession, AuditorId, AuditorRef, FindingResolution, OrganizationId, Question, QuestionId,
    QuestionKind, Response, ResponseId, ResponsePatch, ResponseStatus, Section, SessionId,
    SessionStatus, TemplateId,
};
use audit_core::time::fixed_clock;
use chrono::NaiveDate;
use services::report::ReportPrompt;
use services::{AppServices, AuditError, CompletionClient, DisabledNotifier, ReportError};
use storage::repository::{
    InMemoryRepository, ResponseRepository, SessionQuery, SessionRepository, Storage,
    StorageError,
};
use url::Url;

fn offline() -> StorageError {
    StorageError::Connection("store unreachable".into())
}

/// Reads always go through; writes fail while `offline` is set.
struct FlakyResponses {
    inner: InMemoryRepository,
    offline: AtomicBool,
}

impl FlakyResponses {
    fn check(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(offline())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResponseRepository for FlakyResponses {
    async fn upsert_response(&self, response: &Response) -> Result<Response, StorageError> {
        self.check()?;
        self.inner.upsert_response(response).await
    }

    async fn get_response(
        &self,
        session_id: SessionId,
        question_id: &QuestionId,
    ) -> Result<Option<Response>, StorageError> {
        self.inner.get_response(session_id, question_id).await
    }

    async fn get_response_by_id(&self, id: ResponseId) -> Result<Option<Response>, StorageError> {
        self.inner.get_response_by_id(id).await
    }

    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<Response>, StorageError> {
        self.inner.list_by_session(session_id).await
    }

    async fn list_findings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Response>, StorageError> {
        self.inner.list_findings(organization_id).await
    }

    async fn set_resolution(
        &self,
        id: ResponseId,
        resolution: FindingResolution,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set_resolution(id, resolution).await
    }

    async fn delete_for_session(&self, session_id: SessionId) -> Result<u64, StorageError> {
        self.check()?;
        self.inner.delete_for_session(session_id).await
    }
}

/// Session store whose `update_session` fails while `offline` is set.
struct FlakySessions {
    inner: InMemoryRepository,
    offline: AtomicBool,
}

#[async_trait]
impl SessionRepository for FlakySessions {
    async fn insert_session(&self, session: &AuditSession) -> Result<(), StorageError> {
        self.inner.insert_session(session).await
    }

    async fn update_session(&self, session: &AuditSession) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.update_session(session).await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<AuditSession>, StorageError> {
        self.inner.get_session(id).await
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<AuditSession>, StorageError> {
        self.inner.list_sessions(query).await
    }

    async fn count_sessions_for_template(
        &self,
        template_id: TemplateId,
    ) -> Result<u64, StorageError> {
        self.inner.count_sessions_for_template(template_id).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, StorageError> {
        self.inner.delete_session(id).await
    }
}

struct FixedReport;

#[async_trait]
impl CompletionClient for FixedReport {
    fn model(&self) -> Option<String> {
        None
    }

    async fn complete(&self, _prompt: &ReportPrompt) -> Result<String, ReportError> {
        Ok("## Executive Summary\nAll clear.".into())
    }
}

struct Harness {
    app: AppServices,
    responses: Arc<FlakyResponses>,
    sessions: Arc<FlakySessions>,
    org: OrganizationId,
    session: SessionId,
}

async fn harness(questions: &[&str]) -> Harness {
    let repo = InMemoryRepository::new();
    let responses = Arc::new(FlakyResponses {
        inner: repo.clone(),
        offline: AtomicBool::new(false),
    });
    let sessions = Arc::new(FlakySessions {
        inner: repo.clone(),
        offline: AtomicBool::new(false),
    });
    let storage = Storage {
        templates: Arc::new(repo.clone()),
        sessions: sessions.clone(),
        responses: responses.clone(),
        reports: Arc::new(repo),
    };
    let app = AppServices::from_parts(
        storage,
        fixed_clock(),
        Arc::new(DisabledNotifier),
        Arc::new(FixedReport),
        Url::parse("http://localhost:3000").unwrap(),
    );

    let org = OrganizationId::generate();
    let template = app
        .templates()
        .create(
            org,
            "Canteen".into(),
            "Hygiene".into(),
            vec![Section::new(
                "Prep",
                questions
                    .iter()
                    .map(|id| Question::new(*id, format!("Check {id}"), QuestionKind::YesNo))
                    .collect(),
            )],
        )
        .await
        .unwrap();
    let session = app
        .sessions()
        .launch(
            org,
            template.id(),
            AuditorRef {
                id: AuditorId::generate(),
                name: "Ade".into(),
                email: None,
            },
            "Canteen".into(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
        .await
        .unwrap()
        .session
        .id();

    Harness {
        app,
        responses,
        sessions,
        org,
        session,
    }
}

fn compliant() -> ResponsePatch {
    ResponsePatch::status(ResponseStatus::Compliance)
}

#[tokio::test]
async fn failed_answer_write_can_be_retried() {
    let h = harness(&["h1"]).await;
    h.responses.offline.store(true, Ordering::SeqCst);

    let err = h
        .app
        .sessions()
        .answer(h.org, h.session, QuestionId::new("h1"), &compliant())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuditError::Persistence(StorageError::Connection(_))
    ));
    assert!(err.is_retryable());

    let session = h.app.sessions().get(h.org, h.session).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Pending);
    assert_eq!(session.progress(), 0);
    assert!(h.app.ledger().list_by_session(h.session).await.unwrap().is_empty());

    h.responses.offline.store(false, Ordering::SeqCst);
    let outcome = h
        .app
        .sessions()
        .answer(h.org, h.session, QuestionId::new("h1"), &compliant())
        .await
        .unwrap();
    assert_eq!(outcome.session.progress(), 100);
    assert_eq!(outcome.session.status(), SessionStatus::Completed);

    let rows = h.app.ledger().list_by_session(h.session).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, Some(ResponseStatus::Compliance));
}

#[tokio::test]
async fn retry_repairs_progress_after_session_update_fails() {
    let h = harness(&["h1", "h2"]).await;
    h.sessions.offline.store(true, Ordering::SeqCst);

    let err = h
        .app
        .sessions()
        .answer(h.org, h.session, QuestionId::new("h1"), &compliant())
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // The response landed; the cached progress did not.
    assert_eq!(h.app.ledger().list_by_session(h.session).await.unwrap().len(), 1);
    let stale = h.app.sessions().get(h.org, h.session).await.unwrap();
    assert_eq!((stale.progress(), stale.status()), (0, SessionStatus::Pending));

    h.sessions.offline.store(false, Ordering::SeqCst);
    let outcome = h
        .app
        .sessions()
        .answer(h.org, h.session, QuestionId::new("h1"), &compliant())
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.answered, 1);

    let session = h.app.sessions().get(h.org, h.session).await.unwrap();
    assert_eq!((session.progress(), session.status()), (50, SessionStatus::InProgress));
    assert!(session.started_at().is_some());
    assert_eq!(h.app.ledger().list_by_session(h.session).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_delete_keeps_session_and_report() {
    let h = harness(&["h1"]).await;
    h.app
        .sessions()
        .answer(h.org, h.session, QuestionId::new("h1"), &compliant())
        .await
        .unwrap();
    h.app.reports().generate(h.org, h.session).await.unwrap();

    h.responses.offline.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.app.sessions().delete(h.org, h.session).await,
        Err(AuditError::Persistence(_))
    ));
    assert!(h.app.sessions().get(h.org, h.session).await.is_ok());
    assert!(h.app.reports().get(h.org, h.session).await.unwrap().is_some());
    assert_eq!(h.app.ledger().list_by_session(h.session).await.unwrap().len(), 1);

    h.responses.offline.store(false, Ordering::SeqCst);
    h.app.sessions().delete(h.org, h.session).await.unwrap();
    assert!(matches!(
        h.app.sessions().get(h.org, h.session).await,
        Err(AuditError::NotFound { .. })
    ));
}
