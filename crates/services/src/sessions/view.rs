use std::collections::HashSet;

use serde::Serialize;

use audit_core::flatten::{FlatQuestion, flatten};
use audit_core::model::{AuditSession, FindingResolution, FindingSeverity, OrganizationId, SessionId, SessionStatus};
use audit_core::progress::{Classification, ProgressSnapshot, classify, recompute, risk_score};
use audit_core::sheet::ResponseSheet;
use storage::repository::SessionQuery;

use super::service::{SessionService, load_session};
use crate::error::AuditError;
use crate::templates::load_template;

/// Everything needed to execute or review one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionWorkspace {
    pub session: SessionSummaryView,
    pub questions: Vec<FlatQuestion>,
    pub sheet: ResponseSheet,
    /// Freshly derived from the ledger; may differ from the stored cache.
    pub snapshot: ProgressSnapshot,
    pub buckets: Classification,
    pub risk_score: u32,
    pub read_only: bool,
}

/// Serializable projection of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummaryView {
    pub id: SessionId,
    pub template_name: String,
    pub department: String,
    pub auditor_name: String,
    pub due_date: chrono::NaiveDate,
    pub status: SessionStatus,
    pub progress: u8,
}

impl From<&AuditSession> for SessionSummaryView {
    fn from(session: &AuditSession) -> Self {
        Self {
            id: session.id(),
            template_name: session.template_name().to_owned(),
            department: session.department().to_owned(),
            auditor_name: session.auditor().name.clone(),
            due_date: session.due_date(),
            status: session.status(),
            progress: session.progress(),
        }
    }
}

/// Dashboard counters for an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationOverview {
    pub total_sessions: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
    pub open_findings: usize,
    pub open_non_compliances: usize,
}

impl SessionService {
    /// Load a session with its questions, answers and derived aggregates.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the session or its template is missing.
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn workspace(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Result<SessionWorkspace, AuditError> {
        let session = load_session(self.sessions(), organization_id, session_id).await?;
        let template = load_template(self.templates(), organization_id, session.template_id()).await?;
        let questions = flatten(&template);
        let rows = self.ledger().list_by_session(session_id).await?;

        let snapshot = recompute(&session, &questions, &rows);
        if snapshot.progress != session.progress() {
            tracing::debug!(
                session_id = %session_id,
                cached = session.progress(),
                derived = snapshot.progress,
                "stored progress is stale"
            );
        }

        Ok(SessionWorkspace {
            read_only: session.is_locked(),
            session: SessionSummaryView::from(&session),
            sheet: ResponseSheet::from_rows(&rows),
            buckets: classify(&rows, &questions),
            risk_score: risk_score(&rows),
            snapshot,
            questions,
        })
    }

    /// Session counts per status plus open findings.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Persistence` if storage fails.
    pub async fn overview(
        &self,
        organization_id: OrganizationId,
    ) -> Result<OrganizationOverview, AuditError> {
        let sessions = self
            .sessions()
            .list_sessions(&SessionQuery::for_organization(organization_id))
            .await?;
        let today = self.clock().today();

        let mut overview = OrganizationOverview {
            total_sessions: sessions.len(),
            ..OrganizationOverview::default()
        };
        for session in &sessions {
            match session.status() {
                SessionStatus::Pending => overview.pending += 1,
                SessionStatus::InProgress => overview.in_progress += 1,
                SessionStatus::Completed => overview.completed += 1,
            }
            if session.is_overdue(today) {
                overview.overdue += 1;
            }
        }

        let live: HashSet<SessionId> = sessions.iter().map(AuditSession::id).collect();
        for finding in self.ledger().list_findings(organization_id).await? {
            if finding.resolution != FindingResolution::Open || !live.contains(&finding.session_id) {
                continue;
            }
            overview.open_findings += 1;
            if finding.severity() == Some(FindingSeverity::NonCompliance) {
                overview.open_non_compliances += 1;
            }
        }
        Ok(overview)
    }
}
