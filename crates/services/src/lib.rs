#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod findings;
pub mod ledger;
pub mod notify;
pub mod report;
pub mod sessions;
pub mod templates;

pub use audit_core::Clock;

pub use app_services::AppServices;
pub use config::AppConfig;
pub use error::{AuditError, DependencyError, NotifyError, ReportError, ValidationError};
pub use findings::{FindingFilter, FindingService};
pub use ledger::ResponseLedger;
pub use notify::{AssignmentNotice, DisabledNotifier, Notifier, SmtpNotifier};
pub use report::{ChatCompletionClient, CompletionClient, ReportService};
pub use sessions::{AnswerOutcome, LaunchOutcome, OrganizationOverview, SessionService, SessionWorkspace};
pub use templates::TemplateService;
