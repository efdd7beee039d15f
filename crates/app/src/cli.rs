use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use audit_core::model::{
    FindingResolution, FindingSeverity, OrganizationId, ResponseId, SessionId, SessionStatus,
    TemplateId,
};

/// Operator CLI for audit templates, sessions, findings and reports.
#[derive(Parser, Debug)]
#[command(name = "auditflow")]
#[command(version)]
pub struct Cli {
    /// SQLite URL (overrides AUDIT_DB_URL)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Organization every command runs against
    #[arg(long, global = true, env = "AUDIT_ORG_ID")]
    pub org: Option<OrganizationId>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage audit templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Launch a session from a template and notify the auditor
    Launch(LaunchArgs),

    /// Record or update one answer
    Answer(AnswerArgs),

    /// Submit a session regardless of progress
    Finalize(SessionArg),

    /// Show a session's questions, answers and progress
    Show(ShowArgs),

    /// List sessions, newest first
    Sessions(SessionsArgs),

    /// Remove a session with its responses and report
    Delete(SessionArg),

    /// List warnings and non-compliances
    Findings(FindingsArgs),

    /// Toggle a finding between Open and Resolved
    Resolve(ResolveArgs),

    /// Generate (or fetch) the narrative report for a session
    Report(SessionArg),

    /// Session and finding counters
    Overview,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Create a template from a JSON sections file
    Create(TemplateContent),

    /// Replace a template's content (refused once sessions exist)
    Update {
        #[arg(long)]
        id: TemplateId,
        #[command(flatten)]
        content: TemplateContent,
    },

    /// List templates
    List,

    /// Print a template's flattened questions
    Show {
        #[arg(long)]
        id: TemplateId,
    },

    /// Allow or stop launching sessions from a template
    Activate {
        #[arg(long)]
        id: TemplateId,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        active: bool,
    },
}

#[derive(Args, Debug)]
pub struct TemplateContent {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub category: String,
    /// JSON array of `{name, questions: [{id, text, type}]}`
    #[arg(long)]
    pub sections: PathBuf,
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    #[arg(long)]
    pub template: TemplateId,
    #[arg(long)]
    pub auditor_name: String,
    #[arg(long)]
    pub auditor_email: Option<String>,
    #[arg(long)]
    pub department: String,
    /// Due date, YYYY-MM-DD
    #[arg(long)]
    pub due: NaiveDate,
}

#[derive(Args, Debug)]
pub struct AnswerArgs {
    #[arg(long)]
    pub session: SessionId,
    #[arg(long)]
    pub question: String,
    /// compliance, warning, non-compliance, or a free-form answer
    #[arg(long)]
    pub status: Option<String>,
    /// Notes; an empty string clears them
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct SessionArg {
    #[arg(long)]
    pub session: SessionId,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long)]
    pub session: SessionId,
    /// Print the workspace as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SessionsArgs {
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    /// Show at most this many sessions
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Args, Debug)]
pub struct FindingsArgs {
    /// Only unresolved findings
    #[arg(long)]
    pub open: bool,
    #[arg(long, value_enum)]
    pub severity: Option<SeverityArg>,
    #[arg(long)]
    pub session: Option<SessionId>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(long)]
    pub response: ResponseId,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StatusArg {
    Pending,
    InProgress,
    Completed,
}

impl From<StatusArg> for SessionStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Completed => Self::Completed,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SeverityArg {
    Warning,
    NonCompliance,
}

impl From<SeverityArg> for FindingSeverity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Warning => Self::Warning,
            SeverityArg::NonCompliance => Self::NonCompliance,
        }
    }
}

impl FindingsArgs {
    #[must_use]
    pub fn resolution(&self) -> Option<FindingResolution> {
        self.open.then_some(FindingResolution::Open)
    }
}
