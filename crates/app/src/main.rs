use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit_core::model::{
    AuditorId, AuditorRef, OrganizationId, QuestionId, ResponsePatch, ResponseStatus, Section,
};
use audit_core::{Clock, flatten};
use services::{AppConfig, AppServices, FindingFilter};

mod cli;

use cli::{Cli, Command, TemplateCommand, TemplateContent};

const DEFAULT_LOG_FILTER: &str = "auditflow=info,audit_core=info,services=info,storage=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(db) = cli.db.clone() {
        config = config.with_database_url(db);
    }

    let Some(org) = cli.org else {
        bail!("--org (or AUDIT_ORG_ID) is required");
    };

    let services = AppServices::new_sqlite(&config, Clock::default())
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    tracing::debug!(database_url = %config.database_url, "services ready");
    run(&services, org, cli.command).await
}

async fn run(services: &AppServices, org: OrganizationId, command: Command) -> Result<()> {
    match command {
        Command::Template(cmd) => run_template(services, org, cmd).await?,
        Command::Launch(args) => {
            let auditor = AuditorRef {
                id: AuditorId::generate(),
                name: args.auditor_name,
                email: args.auditor_email,
            };
            let outcome = services
                .sessions()
                .launch(org, args.template, auditor, args.department, args.due)
                .await?;
            println!("session {}", outcome.session.id());
            println!("access  {}", outcome.access_url);
            if let Some(warning) = outcome.notification_warning {
                eprintln!("warning: {warning}");
            }
        }
        Command::Answer(args) => {
            let patch = ResponsePatch {
                status: args.status.as_deref().and_then(ResponseStatus::parse),
                notes: args.notes,
            };
            let outcome = services
                .sessions()
                .answer(org, args.session, QuestionId::new(args.question), &patch)
                .await?;
            println!(
                "{}/{} answered, {}% ({})",
                outcome.snapshot.answered,
                outcome.snapshot.total,
                outcome.snapshot.progress,
                outcome.session.status()
            );
        }
        Command::Finalize(args) => {
            let session = services.sessions().finalize(org, args.session).await?;
            println!("{} {} at {}%", session.id(), session.status(), session.progress());
        }
        Command::Show(args) => {
            let workspace = services.sessions().workspace(org, args.session).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&workspace)?);
            } else {
                let total = workspace.questions.len();
                println!(
                    "{} | {} | {} | {}%",
                    workspace.session.template_name,
                    workspace.session.department,
                    workspace.session.status,
                    workspace.snapshot.progress
                );
                for q in &workspace.questions {
                    let answer = workspace
                        .sheet
                        .get(q.id())
                        .and_then(|e| e.status.as_ref())
                        .map_or("-", |s| s.as_str());
                    println!(
                        "Module {} of {total} [{}] {}: {answer}",
                        q.index + 1,
                        q.section,
                        q.question.text
                    );
                }
                println!("risk score {}", workspace.risk_score);
            }
        }
        Command::Sessions(args) => {
            let sessions = services
                .sessions()
                .list(org, args.status.map(Into::into), args.limit)
                .await?;
            for s in sessions {
                println!(
                    "{} {:<11} {:>3}% {} / {} due {}",
                    s.id(),
                    s.status().as_str(),
                    s.progress(),
                    s.template_name(),
                    s.department(),
                    s.due_date()
                );
            }
        }
        Command::Delete(args) => {
            services.sessions().delete(org, args.session).await?;
            println!("deleted {}", args.session);
        }
        Command::Findings(args) => {
            let mut filter = FindingFilter::default();
            if let Some(resolution) = args.resolution() {
                filter = filter.with_resolution(resolution);
            }
            if let Some(severity) = args.severity {
                filter = filter.with_severity(severity.into());
            }
            if let Some(session) = args.session {
                filter = filter.for_session(session);
            }
            for f in services.findings().list(org, &filter).await? {
                println!(
                    "{} {:?} {} [{}] {} ({} / {})",
                    f.response_id,
                    f.severity,
                    f.resolution.as_str(),
                    f.section,
                    f.question_text,
                    f.template_name,
                    f.department
                );
            }
        }
        Command::Resolve(args) => {
            let next = services
                .findings()
                .toggle_resolution(org, args.response)
                .await?;
            println!("{} {}", args.response, next.as_str());
        }
        Command::Report(args) => {
            let report = services.reports().generate(org, args.session).await?;
            println!("{}", report.content);
        }
        Command::Overview => {
            let overview = services.sessions().overview(org).await?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
    }
    Ok(())
}

async fn run_template(services: &AppServices, org: OrganizationId, cmd: TemplateCommand) -> Result<()> {
    let templates = services.templates();
    match cmd {
        TemplateCommand::Create(content) => {
            let sections = read_sections(&content)?;
            let template = templates
                .create(org, content.name, content.category, sections)
                .await?;
            println!("template {} ({} questions)", template.id(), template.question_count());
        }
        TemplateCommand::Update { id, content } => {
            let sections = read_sections(&content)?;
            let template = templates
                .update(org, id, content.name, content.category, sections)
                .await?;
            println!("template {} now at version {}", template.id(), template.version());
        }
        TemplateCommand::List => {
            for t in templates.list(org).await? {
                println!(
                    "{} v{} {} [{}] {} questions{}",
                    t.id(),
                    t.version(),
                    t.name(),
                    t.category(),
                    t.question_count(),
                    if t.is_active() { "" } else { " (inactive)" }
                );
            }
        }
        TemplateCommand::Show { id } => {
            let template = templates.get(org, id).await?;
            let questions = flatten(&template);
            for q in &questions {
                println!(
                    "{:>3}. [{}] {} ({})",
                    q.index + 1,
                    q.section,
                    q.question.text,
                    q.id()
                );
            }
        }
        TemplateCommand::Activate { id, active } => {
            let template = templates.set_active(org, id, active).await?;
            println!("template {} active={}", template.id(), template.is_active());
        }
    }
    Ok(())
}

fn read_sections(content: &TemplateContent) -> Result<Vec<Section>> {
    let raw = std::fs::read_to_string(&content.sections)
        .with_context(|| format!("failed to read {}", content.sections.display()))?;
    parse_sections(&raw).with_context(|| format!("invalid sections in {}", content.sections.display()))
}

/// Authoring input is decoded strictly; a malformed question is an error,
/// not a skipped entry.
fn parse_sections(raw: &str) -> Result<Vec<Section>> {
    let sections: Vec<Section> = serde_json::from_str(raw)?;
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use audit_core::model::decode_sections;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn default_filter_keeps_library_warnings() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || writer.clone()),
            );

        tracing::subscriber::with_default(subscriber, || {
            assert!(decode_sections("not json").is_empty());
            tracing::info!("binary event");
            tracing::debug!(target: "storage::sqlite", "hidden debug");
        });

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("audit_core"), "{out}");
        assert!(out.contains("template sections are not valid JSON"), "{out}");
        assert!(out.contains("binary event"), "{out}");
        assert!(!out.contains("hidden debug"), "{out}");
    }

    #[test]
    fn authoring_sections_reject_malformed_questions() {
        let ok = parse_sections(
            r#"[{"name":"Dock","questions":[{"id":"d1","text":"Plates secured?","type":"yes-no"}]}]"#,
        );
        assert_eq!(ok.unwrap()[0].questions.len(), 1);

        assert!(parse_sections(r#"[{"name":"Dock","questions":[{"text":"no id"}]}]"#).is_err());
        assert!(parse_sections(r#"{"name":"Dock"}"#).is_err());
    }
}
