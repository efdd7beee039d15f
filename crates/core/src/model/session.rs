use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AuditorId, OrganizationId, SessionId, TemplateId};
use crate::model::template::Template;
use crate::progress::ProgressSnapshot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("department cannot be empty")]
    EmptyDepartment,

    #[error("auditor name cannot be empty")]
    EmptyAuditorName,

    #[error("template {0} is not active")]
    InactiveTemplate(TemplateId),

    #[error("invalid session status: {0}")]
    InvalidStatus(String),

    #[error("progress must be between 0 and 100, got {0}")]
    InvalidProgress(u32),
}

/// Lifecycle state of an audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidStatus` for unknown values.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        match raw {
            "Pending" => Ok(Self::Pending),
            "In Progress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            other => Err(SessionError::InvalidStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The team member an audit is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorRef {
    pub id: AuditorId,
    pub name: String,
    pub email: Option<String>,
}

/// One execution of a template against a department, auditor and due date.
///
/// `progress` and `status` are a cache of what the response rows imply; the
/// progress engine recomputes them after every answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSession {
    id: SessionId,
    organization_id: OrganizationId,
    template_id: TemplateId,
    template_name: String,
    auditor: AuditorRef,
    department: String,
    due_date: NaiveDate,
    status: SessionStatus,
    progress: u8,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl AuditSession {
    /// Create a pending session for `template`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the department or auditor name is blank, or the
    /// template has been deactivated.
    pub fn launch(
        id: SessionId,
        template: &Template,
        auditor: AuditorRef,
        department: impl Into<String>,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if !template.is_active() {
            return Err(SessionError::InactiveTemplate(template.id()));
        }
        let department = department.into().trim().to_owned();
        if department.is_empty() {
            return Err(SessionError::EmptyDepartment);
        }
        if auditor.name.trim().is_empty() {
            return Err(SessionError::EmptyAuditorName);
        }

        Ok(Self {
            id,
            organization_id: template.organization_id(),
            template_id: template.id(),
            template_name: template.name().to_owned(),
            auditor,
            department,
            due_date,
            status: SessionStatus::Pending,
            progress: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    /// Rehydrate a session from storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidProgress` if the stored progress exceeds 100.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        organization_id: OrganizationId,
        template_id: TemplateId,
        template_name: String,
        auditor: AuditorRef,
        department: String,
        due_date: NaiveDate,
        status: SessionStatus,
        progress: u32,
        created_at: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionError> {
        let progress = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(SessionError::InvalidProgress(progress))?;
        Ok(Self {
            id,
            organization_id,
            template_id,
            template_name,
            auditor,
            department,
            due_date,
            status,
            progress,
            created_at,
            started_at,
            completed_at,
        })
    }

    /// Store a freshly computed snapshot, stamping start/completion times on the
    /// transitions into `InProgress` and `Completed`.
    pub fn apply_progress(&mut self, snapshot: &ProgressSnapshot, now: DateTime<Utc>) {
        self.progress = snapshot.progress;
        if snapshot.answered > 0 && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if snapshot.status == SessionStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.status = snapshot.status;
    }

    /// Force completion regardless of progress (early submission).
    ///
    /// Returns `false` if the session was already completed; the original
    /// completion time is kept in that case.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == SessionStatus::Completed && self.completed_at.is_some() {
            return false;
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        true
    }

    /// Completed sessions no longer accept answers.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_locked() && self.due_date < today
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    #[must_use]
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    #[must_use]
    pub fn auditor(&self) -> &AuditorRef {
        &self.auditor
    }

    #[must_use]
    pub fn department(&self) -> &str {
        &self.department
    }

    #[must_use]
    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}
