use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flatten::FlatQuestion;
use crate::model::ids::{QuestionId, ResponseId, SessionId};
use crate::model::response::{FindingResolution, FindingSeverity, Response};
use crate::model::session::AuditSession;

/// A warning or non-compliance response, enriched for review.
///
/// Not stored on its own; resolution lives on the response row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub response_id: ResponseId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub question_text: String,
    pub section: String,
    pub severity: FindingSeverity,
    pub notes: Option<String>,
    pub resolution: FindingResolution,
    pub template_name: String,
    pub department: String,
    pub auditor_name: String,
    pub recorded_at: DateTime<Utc>,
}

impl Finding {
    /// Returns `None` when the response is not a finding.
    #[must_use]
    pub fn from_parts(
        response: &Response,
        question: &FlatQuestion,
        session: &AuditSession,
    ) -> Option<Self> {
        let severity = response.severity()?;
        Some(Self {
            response_id: response.id,
            session_id: response.session_id,
            question_id: response.question_id.clone(),
            question_text: question.question.text.clone(),
            section: question.section.clone(),
            severity,
            notes: response.notes.clone(),
            resolution: response.resolution,
            template_name: session.template_name().to_owned(),
            department: session.department().to_owned(),
            auditor_name: session.auditor().name.clone(),
            recorded_at: response.updated_at,
        })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resolution == FindingResolution::Open
    }
}
