use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OrganizationId, QuestionId, ResponseId, SessionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResponseError {
    #[error("response update must set a status or notes")]
    EmptyPatch,

    #[error("question id cannot be empty")]
    EmptyQuestionId,

    #[error("response status cannot be empty")]
    EmptyStatus,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Recorded answer for a question.
///
/// Yes/no questions use the three compliance verdicts; other question kinds store
/// their free-form value in `Answer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResponseStatus {
    Compliance,
    Warning,
    NonCompliance,
    Answer(String),
}

impl ResponseStatus {
    pub const COMPLIANCE: &'static str = "compliance";
    pub const WARNING: &'static str = "warning";
    pub const NON_COMPLIANCE: &'static str = "non-compliance";

    /// Parse a raw status value. Blank input yields `None` (unanswered).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed {
            "" => None,
            Self::COMPLIANCE => Some(Self::Compliance),
            Self::WARNING => Some(Self::Warning),
            Self::NON_COMPLIANCE => Some(Self::NonCompliance),
            other => Some(Self::Answer(other.to_owned())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Compliance => Self::COMPLIANCE,
            Self::Warning => Self::WARNING,
            Self::NonCompliance => Self::NON_COMPLIANCE,
            Self::Answer(value) => value,
        }
    }

    /// Finding severity, if this status indicates a compliance problem.
    #[must_use]
    pub fn severity(&self) -> Option<FindingSeverity> {
        match self {
            Self::Warning => Some(FindingSeverity::Warning),
            Self::NonCompliance => Some(FindingSeverity::NonCompliance),
            Self::Compliance | Self::Answer(_) => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ResponseStatus {
    type Error = ResponseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(ResponseError::EmptyStatus)
    }
}

impl From<ResponseStatus> for String {
    fn from(value: ResponseStatus) -> Self {
        match value {
            ResponseStatus::Answer(answer) => answer,
            other => other.as_str().to_owned(),
        }
    }
}

/// Severity of a finding derived from a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingSeverity {
    Warning,
    NonCompliance,
}

impl FindingSeverity {
    #[must_use]
    pub fn as_status(self) -> ResponseStatus {
        match self {
            Self::Warning => ResponseStatus::Warning,
            Self::NonCompliance => ResponseStatus::NonCompliance,
        }
    }
}

/// Reviewer-controlled resolution flag, independent of the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FindingResolution {
    #[default]
    Open,
    Resolved,
}

impl FindingResolution {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Resolved,
            Self::Resolved => Self::Open,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Resolved => "Resolved",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Open" => Some(Self::Open),
            "Resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

//
// ─── PATCH ─────────────────────────────────────────────────────────────────────
//

/// Partial update to a response. `None` fields keep their last stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePatch {
    pub status: Option<ResponseStatus>,
    /// `Some("")` clears the notes.
    pub notes: Option<String>,
}

impl ResponsePatch {
    #[must_use]
    pub fn status(status: ResponseStatus) -> Self {
        Self {
            status: Some(status),
            notes: None,
        }
    }

    #[must_use]
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            status: None,
            notes: Some(notes.into()),
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.notes.is_none()
    }

    /// # Errors
    ///
    /// Returns `ResponseError::EmptyPatch` when neither field is set.
    pub fn validate(&self) -> Result<(), ResponseError> {
        if self.is_empty() {
            return Err(ResponseError::EmptyPatch);
        }
        Ok(())
    }
}

//
// ─── RESPONSE ──────────────────────────────────────────────────────────────────
//

/// One answer to one question within a session; unique per (session, question).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub status: Option<ResponseStatus>,
    pub notes: Option<String>,
    pub resolution: FindingResolution,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Response {
    /// Build the row a patch produces, merging onto `current` when one exists.
    ///
    /// The existing row keeps its id, creation time and resolution flag.
    ///
    /// # Errors
    ///
    /// Returns `ResponseError` if the question id is blank or the patch is empty.
    pub fn merged(
        current: Option<&Response>,
        new_id: ResponseId,
        organization_id: OrganizationId,
        session_id: SessionId,
        question_id: QuestionId,
        patch: &ResponsePatch,
        now: DateTime<Utc>,
    ) -> Result<Self, ResponseError> {
        if question_id.is_blank() {
            return Err(ResponseError::EmptyQuestionId);
        }
        patch.validate()?;

        let mut next = match current {
            Some(existing) => existing.clone(),
            None => Self {
                id: new_id,
                organization_id,
                session_id,
                question_id,
                status: None,
                notes: None,
                resolution: FindingResolution::Open,
                created_at: now,
                updated_at: now,
            },
        };

        if let Some(status) = &patch.status {
            next.status = Some(status.clone());
        }
        if let Some(notes) = &patch.notes {
            let trimmed = notes.trim();
            next.notes = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        }
        next.updated_at = now;
        Ok(next)
    }

    /// Whether this response counts toward progress.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.status.is_some()
    }

    #[must_use]
    pub fn severity(&self) -> Option<FindingSeverity> {
        self.status.as_ref().and_then(ResponseStatus::severity)
    }
}
