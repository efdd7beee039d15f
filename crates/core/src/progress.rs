//! Session progress engine.
//!
//! Derives a session's cached `progress`/`status` from its response rows and
//! sorts responses into compliance buckets. Everything here is pure; callers
//! persist the results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::flatten::{FlatQuestion, index_by_id};
use crate::model::{AuditSession, QuestionId, Response, ResponseStatus, SessionStatus};

/// Points added to the risk score per non-compliance.
pub const RISK_POINTS_PER_NON_COMPLIANCE: u32 = 10;

/// Derived progress for a session at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub answered: usize,
    /// Whole percent, 0..=100.
    pub progress: u8,
    pub status: SessionStatus,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}

/// Recompute progress and status for `session`.
#[must_use]
pub fn recompute(
    session: &AuditSession,
    questions: &[FlatQuestion],
    responses: &[Response],
) -> ProgressSnapshot {
    recompute_status(session.status(), questions, responses)
}

/// Recompute starting from a known status.
///
/// Only answered responses to questions still in `questions` count, each
/// question at most once. A session that is already `Completed` stays completed
/// even when progress is below 100 (it was finalized early).
#[must_use]
pub fn recompute_status(
    current: SessionStatus,
    questions: &[FlatQuestion],
    responses: &[Response],
) -> ProgressSnapshot {
    let known: HashSet<&QuestionId> = questions.iter().map(FlatQuestion::id).collect();
    let answered = responses
        .iter()
        .filter(|r| r.is_answered() && known.contains(&r.question_id))
        .map(|r| &r.question_id)
        .collect::<HashSet<_>>()
        .len();

    let total = known.len();
    let progress = percent(answered, total);

    let status = if current == SessionStatus::Completed || progress == 100 {
        SessionStatus::Completed
    } else if answered > 0 {
        SessionStatus::InProgress
    } else {
        SessionStatus::Pending
    };

    ProgressSnapshot {
        total,
        answered,
        progress,
        status,
    }
}

/// `round(100 * answered / total)` with halves rounded up; 0 when `total` is 0.
#[must_use]
pub fn percent(answered: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let answered = answered.min(total) as u128;
    let total = total as u128;
    let rounded = (200 * answered + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

/// A response paired with the question it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedResponse {
    pub response: Response,
    pub question: FlatQuestion,
}

/// Responses partitioned by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub compliant: Vec<ClassifiedResponse>,
    pub warnings: Vec<ClassifiedResponse>,
    pub non_compliances: Vec<ClassifiedResponse>,
}

impl Classification {
    #[must_use]
    pub fn len(&self) -> usize {
        self.compliant.len() + self.warnings.len() + self.non_compliances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition responses into compliant / warnings / non-compliances.
///
/// Anything that is not a warning or non-compliance (verdict "compliance",
/// free-form answers, notes-only rows) is compliant. Buckets follow the
/// flattened question order. Responses whose question is not in `questions`
/// are dropped with a warning.
#[must_use]
pub fn classify(responses: &[Response], questions: &[FlatQuestion]) -> Classification {
    let index = index_by_id(questions);
    let mut resolved: Vec<ClassifiedResponse> = Vec::with_capacity(responses.len());

    for response in responses {
        match index.get(&response.question_id) {
            Some(question) => resolved.push(ClassifiedResponse {
                response: response.clone(),
                question: (*question).clone(),
            }),
            None => tracing::warn!(
                session_id = %response.session_id,
                question_id = %response.question_id,
                "dropping response for a question not in the template"
            ),
        }
    }
    resolved.sort_by_key(|c| c.question.index);

    let mut out = Classification::default();
    for entry in resolved {
        match entry.response.status {
            Some(ResponseStatus::NonCompliance) => out.non_compliances.push(entry),
            Some(ResponseStatus::Warning) => out.warnings.push(entry),
            _ => out.compliant.push(entry),
        }
    }
    out
}

/// Illustrative risk metric: ten points per non-compliance, unbounded.
#[must_use]
pub fn risk_score(responses: &[Response]) -> u32 {
    let count = responses
        .iter()
        .filter(|r| r.status == Some(ResponseStatus::NonCompliance))
        .count();
    u32::try_from(count)
        .unwrap_or(u32::MAX)
        .saturating_mul(RISK_POINTS_PER_NON_COMPLIANCE)
}
