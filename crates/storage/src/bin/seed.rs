use std::fmt;

use audit_core::flatten;
use audit_core::model::{
    AuditSession, AuditorId, AuditorRef, OrganizationId, Question, QuestionKind, Response,
    ResponseId, ResponsePatch, ResponseStatus, Section, SessionId, Template, TemplateId,
};
use audit_core::progress::recompute;
use chrono::{DateTime, Duration, Utc};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    organization_id: OrganizationId,
    sessions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidOrganization { raw: String },
    InvalidSessions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidOrganization { raw } => write!(f, "invalid --org value: {raw}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("AUDIT_DB_URL").unwrap_or_else(|_| "sqlite://audit.sqlite3".into());
        let mut organization_id = std::env::var("AUDIT_ORG_ID")
            .ok()
            .and_then(|value| value.parse::<OrganizationId>().ok())
            .unwrap_or_else(OrganizationId::generate);
        let mut sessions = std::env::var("AUDIT_SEED_SESSIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(2);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--org" => {
                    let value = require_value(&mut args, "--org")?;
                    organization_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidOrganization { raw: value.clone() })?;
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            organization_id,
            sessions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://audit.sqlite3)");
    eprintln!("  --org <uuid>              Organization to seed (default: random)");
    eprintln!("  --sessions <n>            Number of sample sessions to launch (default: 2)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  AUDIT_DB_URL, AUDIT_ORG_ID, AUDIT_SEED_SESSIONS");
}

fn demo_sections() -> Vec<Section> {
    vec![
        Section::new(
            "Fire Safety",
            vec![
                Question::new("fs-1", "Are fire exits clearly marked and unobstructed?", QuestionKind::YesNo),
                Question::new("fs-2", "Were extinguishers inspected in the last 12 months?", QuestionKind::YesNo),
            ],
        ),
        Section::new(
            "Housekeeping",
            vec![
                Question::new("hk-1", "Are walkways free of trip hazards?", QuestionKind::YesNo),
                Question::new("hk-2", "Rate overall cleanliness (1-5)", QuestionKind::Score),
            ],
        ),
    ]
}

fn demo_session(
    template: &Template,
    index: u32,
    launched_at: DateTime<Utc>,
) -> Result<AuditSession, audit_core::Error> {
    let auditor = AuditorRef {
        id: AuditorId::generate(),
        name: format!("Auditor {}", index + 1),
        email: None,
    };
    Ok(AuditSession::launch(
        SessionId::generate(),
        template,
        auditor,
        format!("Warehouse {}", index + 1),
        launched_at.date_naive() + Duration::days(14),
        launched_at,
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let template = Template::new(
        TemplateId::generate(),
        args.organization_id,
        "Site Safety Walkthrough",
        "Health & Safety",
        demo_sections(),
        now,
    )?;
    storage.templates.upsert_template(&template).await?;
    let questions = flatten(&template);

    let answers = [
        ResponseStatus::Compliance,
        ResponseStatus::NonCompliance,
        ResponseStatus::Warning,
    ];
    for i in 0..args.sessions {
        let launched_at = now - Duration::days(i64::from(i) * 3);
        let mut session = demo_session(&template, i, launched_at)?;
        storage.sessions.insert_session(&session).await?;

        let answered = (i as usize + 1).min(answers.len());
        for (question, status) in questions.iter().zip(answers.iter()).take(answered) {
            let patch = ResponsePatch::status(status.clone());
            let row = Response::merged(
                None,
                ResponseId::generate(),
                session.organization_id(),
                session.id(),
                question.id().clone(),
                &patch,
                launched_at,
            )?;
            storage.responses.upsert_response(&row).await?;
        }

        let rows = storage.responses.list_by_session(session.id()).await?;
        let snapshot = recompute(&session, &questions, &rows);
        session.apply_progress(&snapshot, launched_at);
        storage.sessions.update_session(&session).await?;
    }

    println!(
        "Seeded template {} with {} sessions for organization {} into {}",
        template.id(),
        args.sessions,
        args.organization_id,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
