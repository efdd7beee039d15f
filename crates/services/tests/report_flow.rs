use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use audit_core::model::{
    AuditorId, AuditorRef, OrganizationId, Question, QuestionId, QuestionKind, ResponsePatch,
    ResponseStatus, Section, SessionId,
};
use audit_core::time::fixed_clock;
use chrono::NaiveDate;
use services::report::ReportPrompt;
use services::{
    AppServices, AuditError, CompletionClient, DependencyError, DisabledNotifier, ReportError,
};
use storage::repository::Storage;
use url::Url;

#[derive(Default)]
struct ScriptedClient {
    fail: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<ReportPrompt>>,
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn model(&self) -> Option<String> {
        Some("scripted-1".into())
    }

    async fn complete(&self, prompt: &ReportPrompt) -> Result<String, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        if self.fail {
            return Err(ReportError::EmptyResponse);
        }
        Ok("## Executive Summary\nOne critical issue.".into())
    }
}

async fn completed_session(app: &AppServices, org: OrganizationId) -> SessionId {
    let template = app
        .templates()
        .create(
            org,
            "Pharmacy storage".into(),
            "Compliance".into(),
            vec![Section::new(
                "Cold room",
                vec![
                    Question::new("c1", "Temperature logged twice daily?", QuestionKind::YesNo),
                    Question::new("c2", "Door seal intact?", QuestionKind::YesNo),
                ],
            )],
        )
        .await
        .unwrap();
    let sessions = app.sessions();
    let id = sessions
        .launch(
            org,
            template.id(),
            AuditorRef {
                id: AuditorId::generate(),
                name: "Iris".into(),
                email: None,
            },
            "Ward 3".into(),
            NaiveDate::from_ymd_opt(2023, 12, 20).unwrap(),
        )
        .await
        .unwrap()
        .session
        .id();
    sessions
        .answer(
            org,
            id,
            QuestionId::new("c1"),
            &ResponsePatch::status(ResponseStatus::NonCompliance).with_notes("gaps on weekends"),
        )
        .await
        .unwrap();
    sessions
        .answer(org, id, QuestionId::new("c2"), &ResponsePatch::status(ResponseStatus::Compliance))
        .await
        .unwrap();
    id
}

fn services(client: Arc<ScriptedClient>) -> AppServices {
    AppServices::from_parts(
        Storage::in_memory(),
        fixed_clock(),
        Arc::new(DisabledNotifier),
        client,
        Url::parse("http://localhost:3000").unwrap(),
    )
}

#[tokio::test]
async fn generate_is_idempotent_per_session() {
    let client = Arc::new(ScriptedClient::default());
    let app = services(Arc::clone(&client));
    let org = OrganizationId::generate();
    let id = completed_session(&app, org).await;
    let reports = app.reports();

    assert!(reports.get(org, id).await.unwrap().is_none());

    let first = reports.generate(org, id).await.unwrap();
    assert_eq!(first.content, "## Executive Summary\nOne critical issue.");
    assert_eq!(first.model.as_deref(), Some("scripted-1"));

    let second = reports.generate(org, id).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(reports.get(org, id).await.unwrap(), Some(first));

    let prompts = client.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert_eq!(prompt.system, "You are a professional auditor assistant.");
    assert!(prompt.user.contains("Audit Name: Pharmacy storage"));
    assert!(prompt.user.contains(
        "- [Cold room] Temperature logged twice daily?: non-compliance (Notes: gaps on weekends)"
    ));
    assert!(prompt.user.contains("Compliant Areas:\n- [Cold room] Door seal intact?: compliance"));
}

#[tokio::test]
async fn failed_generation_stores_nothing() {
    let client = Arc::new(ScriptedClient {
        fail: true,
        ..ScriptedClient::default()
    });
    let app = services(Arc::clone(&client));
    let org = OrganizationId::generate();
    let id = completed_session(&app, org).await;

    let err = app.reports().generate(org, id).await.unwrap_err();
    assert!(matches!(
        err,
        AuditError::Dependency(DependencyError::Report(ReportError::EmptyResponse))
    ));
    assert!(err.is_retryable());
    assert!(app.reports().get(org, id).await.unwrap().is_none());

    let session = app.sessions().get(org, id).await.unwrap();
    assert_eq!(session.progress(), 100);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let client = Arc::new(ScriptedClient::default());
    let app = services(Arc::clone(&client));
    let err = app
        .reports()
        .generate(OrganizationId::generate(), SessionId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::NotFound { entity: "session", .. }));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}
