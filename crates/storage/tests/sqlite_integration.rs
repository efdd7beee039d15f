use audit_core::model::{
    AuditSession, AuditorId, AuditorRef, FindingResolution, NarrativeReport, OrganizationId,
    Question, QuestionId, QuestionKind, Response, ResponseId, ResponsePatch, ResponseStatus,
    Section, SessionId, SessionStatus, Template, TemplateId,
};
use audit_core::time::fixed_now;
use chrono::{Duration, NaiveDate};
use storage::repository::{
    ReportRepository, ResponseRepository, SessionQuery, SessionRepository, StorageError,
    TemplateRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn template(org: OrganizationId) -> Template {
    Template::new(
        TemplateId::generate(),
        org,
        "Cold chain",
        "Food safety",
        vec![
            Section::new(
                "Storage",
                vec![
                    Question::new("s1", "Fridge below 5C?", QuestionKind::YesNo),
                    Question::new("s2", "Freezer log signed?", QuestionKind::YesNo),
                ],
            ),
            Section::new(
                "Delivery",
                vec![Question::new("d1", "Probe reading", QuestionKind::Text)],
            ),
        ],
        fixed_now(),
    )
    .unwrap()
}

fn session(template: &Template, minutes: i64) -> AuditSession {
    AuditSession::launch(
        SessionId::generate(),
        template,
        AuditorRef {
            id: AuditorId::generate(),
            name: "Priya".into(),
            email: Some("priya@example.com".into()),
        },
        "Kitchen",
        NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap()
}

fn answer(session: &AuditSession, question: &str, patch: &ResponsePatch, minutes: i64) -> Response {
    Response::merged(
        None,
        ResponseId::generate(),
        session.organization_id(),
        session.id(),
        QuestionId::new(question),
        patch,
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_template_roundtrip_keeps_sections() {
    let repo = connect("memdb_templates").await;
    let org = OrganizationId::generate();
    let mut t = template(org);
    repo.upsert_template(&t).await.unwrap();

    let fetched = repo.get_template(t.id()).await.unwrap().expect("template");
    assert_eq!(fetched, t);

    t.set_active(false, fixed_now() + Duration::hours(1));
    repo.upsert_template(&t).await.unwrap();
    let listed = repo.list_templates(org).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_active());
    assert!(repo.list_templates(OrganizationId::generate()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_response_upsert_is_idempotent_per_question() {
    let repo = connect("memdb_upsert").await;
    let t = template(OrganizationId::generate());
    repo.upsert_template(&t).await.unwrap();
    let s = session(&t, 0);
    repo.insert_session(&s).await.unwrap();

    let first = repo
        .upsert_response(&answer(&s, "s1", &ResponsePatch::status(ResponseStatus::Compliance), 1))
        .await
        .unwrap();
    let second = repo
        .upsert_response(&answer(
            &s,
            "s1",
            &ResponsePatch::status(ResponseStatus::NonCompliance).with_notes("seal torn"),
            2,
        ))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.status, Some(ResponseStatus::NonCompliance));
    assert_eq!(second.notes.as_deref(), Some("seal torn"));

    let rows = repo.list_by_session(s.id()).await.unwrap();
    assert_eq!(rows.len(), 1);

    let by_question = repo
        .get_response(s.id(), &QuestionId::new("s1"))
        .await
        .unwrap()
        .expect("row");
    assert_eq!(by_question.id, first.id);
}

#[tokio::test]
async fn sqlite_free_form_answers_roundtrip() {
    let repo = connect("memdb_free_form").await;
    let t = template(OrganizationId::generate());
    repo.upsert_template(&t).await.unwrap();
    let s = session(&t, 0);
    repo.insert_session(&s).await.unwrap();

    let stored = repo
        .upsert_response(&answer(
            &s,
            "d1",
            &ResponsePatch::status(ResponseStatus::Answer("3.8C".into())),
            1,
        ))
        .await
        .unwrap();
    assert_eq!(stored.status, Some(ResponseStatus::Answer("3.8C".into())));

    let notes_only = repo
        .upsert_response(&answer(&s, "s2", &ResponsePatch::notes("log missing"), 2))
        .await
        .unwrap();
    assert_eq!(notes_only.status, None);
    assert!(!notes_only.is_answered());
}

#[tokio::test]
async fn sqlite_findings_and_resolution_toggle() {
    let repo = connect("memdb_findings").await;
    let org = OrganizationId::generate();
    let t = template(org);
    repo.upsert_template(&t).await.unwrap();
    let s = session(&t, 0);
    repo.insert_session(&s).await.unwrap();

    for (question, status, minute) in [
        ("s1", ResponseStatus::Warning, 1),
        ("s2", ResponseStatus::NonCompliance, 2),
        ("d1", ResponseStatus::Compliance, 3),
    ] {
        repo.upsert_response(&answer(&s, question, &ResponsePatch::status(status), minute))
            .await
            .unwrap();
    }

    let findings = repo.list_findings(org).await.unwrap();
    let ids: Vec<&str> = findings.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(ids, ["s2", "s1"]);

    let target = findings[0].id;
    repo.set_resolution(target, FindingResolution::Resolved)
        .await
        .unwrap();
    let row = repo.get_response_by_id(target).await.unwrap().expect("row");
    assert_eq!(row.resolution, FindingResolution::Resolved);

    assert!(matches!(
        repo.set_resolution(ResponseId::generate(), FindingResolution::Open).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_sessions_update_list_and_cascade_delete() {
    let repo = connect("memdb_sessions").await;
    let org = OrganizationId::generate();
    let t = template(org);
    repo.upsert_template(&t).await.unwrap();

    let older = session(&t, 0);
    let mut newer = session(&t, 10);
    repo.insert_session(&older).await.unwrap();
    repo.insert_session(&newer).await.unwrap();
    assert!(matches!(
        repo.insert_session(&older).await,
        Err(StorageError::Conflict)
    ));

    newer.finalize(fixed_now() + Duration::minutes(20));
    repo.update_session(&newer).await.unwrap();
    let fetched = repo.get_session(newer.id()).await.unwrap().expect("session");
    assert_eq!(fetched.status(), SessionStatus::Completed);
    assert_eq!(fetched.completed_at(), newer.completed_at());
    assert_eq!(fetched.auditor(), newer.auditor());

    let all = repo
        .list_sessions(&SessionQuery::for_organization(org))
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(AuditSession::id).collect::<Vec<_>>(),
        vec![newer.id(), older.id()]
    );
    let pending = repo
        .list_sessions(
            &SessionQuery::for_organization(org)
                .with_status(SessionStatus::Pending)
                .with_limit(5),
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id(), older.id());
    assert_eq!(repo.count_sessions_for_template(t.id()).await.unwrap(), 2);

    repo.upsert_response(&answer(&newer, "s1", &ResponsePatch::status(ResponseStatus::Warning), 1))
        .await
        .unwrap();
    let report = NarrativeReport {
        session_id: newer.id(),
        organization_id: org,
        content: "Executive Summary".into(),
        model: Some("test-model".into()),
        created_at: fixed_now(),
    };
    repo.insert_report(&report).await.unwrap();

    assert!(repo.delete_session(newer.id()).await.unwrap());
    assert!(repo.list_by_session(newer.id()).await.unwrap().is_empty());
    assert!(repo.get_report(newer.id()).await.unwrap().is_none());
    assert!(!repo.delete_session(newer.id()).await.unwrap());
}

#[tokio::test]
async fn sqlite_report_insert_keeps_first() {
    let repo = connect("memdb_reports").await;
    let t = template(OrganizationId::generate());
    repo.upsert_template(&t).await.unwrap();
    let s = session(&t, 0);
    repo.insert_session(&s).await.unwrap();

    let make = |content: &str| NarrativeReport {
        session_id: s.id(),
        organization_id: s.organization_id(),
        content: content.into(),
        model: None,
        created_at: fixed_now(),
    };
    repo.insert_report(&make("first")).await.unwrap();
    let stored = repo.insert_report(&make("second")).await.unwrap();
    assert_eq!(stored.content, "first");

    let unknown = SessionId::generate();
    assert!(repo.get_report(unknown).await.unwrap().is_none());
}
