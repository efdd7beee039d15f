//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use audit_core::model::{ResponseError, ResponseId, SessionId, TemplateError, TemplateId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the narrative report client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("report generation is not configured")]
    Disabled,
    #[error("report generator returned an empty response")]
    EmptyResponse,
    #[error("report request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while dispatching assignment notifications.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotifyError {
    #[error("notifications are not configured")]
    Disabled,
    #[error("auditor has no email address")]
    MissingRecipient,
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("email build error: {0}")]
    Build(String),
}

/// An external collaborator failed. Never rolls back session or response state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DependencyError {
    #[error("report generator failed: {0}")]
    Report(#[from] ReportError),
    #[error("notification dispatch failed: {0}")]
    Notify(#[from] NotifyError),
}

/// Malformed input, rejected before anything is written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error(transparent)]
    Session(#[from] audit_core::model::SessionError),
    #[error("session {0} is completed and read-only")]
    SessionLocked(SessionId),
    #[error("template {id} is used by {sessions} session(s) and cannot be edited")]
    TemplateInUse { id: TemplateId, sessions: u64 },
    #[error("response {0} is not a finding")]
    NotAFinding(ResponseId),
}

/// Error taxonomy surfaced by every service operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StorageError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl AuditError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Dependency(_))
    }
}

impl From<TemplateError> for AuditError {
    fn from(e: TemplateError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<ResponseError> for AuditError {
    fn from(e: ResponseError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<audit_core::model::SessionError> for AuditError {
    fn from(e: audit_core::model::SessionError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<ReportError> for AuditError {
    fn from(e: ReportError) -> Self {
        Self::Dependency(e.into())
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be an absolute http(s) URL: {raw}")]
    NotABaseUrl { var: &'static str, raw: String },
    #[error("{var} is not a valid port: {raw}")]
    InvalidPort { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
