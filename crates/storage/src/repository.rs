use async_trait::async_trait;
use audit_core::model::{
    AuditSession, FindingResolution, NarrativeReport, OrganizationId, QuestionId, Response,
    ResponseId, SessionId, SessionStatus, Template, TemplateId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Filter for listing an organization's sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub organization_id: OrganizationId,
    pub status: Option<SessionStatus>,
    pub limit: Option<u32>,
}

impl SessionQuery {
    #[must_use]
    pub fn for_organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            status: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, session: &AuditSession) -> bool {
        session.organization_id() == self.organization_id
            && self.status.is_none_or(|s| session.status() == s)
    }
}

/// Repository contract for audit templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Persist or update a template.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the template cannot be stored.
    async fn upsert_template(&self, template: &Template) -> Result<(), StorageError>;

    /// Fetch a template by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StorageError>;

    /// List an organization's templates, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_templates(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Template>, StorageError>;
}

/// Repository contract for audit sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is already taken.
    async fn insert_session(&self, session: &AuditSession) -> Result<(), StorageError>;

    /// Overwrite an existing session (last write wins).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_session(&self, session: &AuditSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<AuditSession>, StorageError>;

    /// List sessions matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<AuditSession>, StorageError>;

    /// Number of sessions launched from a template.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn count_sessions_for_template(&self, template_id: TemplateId)
    -> Result<u64, StorageError>;

    /// Delete a session. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_session(&self, id: SessionId) -> Result<bool, StorageError>;
}

/// Repository contract for the response ledger rows.
#[async_trait]
pub trait ResponseRepository: Send + Sync {
    /// Insert or replace the row for `(session_id, question_id)`.
    ///
    /// On conflict the stored row keeps its id, creation time and resolution;
    /// status, notes and `updated_at` are overwritten. Returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn upsert_response(&self, response: &Response) -> Result<Response, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_response(
        &self,
        session_id: SessionId,
        question_id: &QuestionId,
    ) -> Result<Option<Response>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_response_by_id(&self, id: ResponseId) -> Result<Option<Response>, StorageError>;

    /// All rows for a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<Response>, StorageError>;

    /// Every warning / non-compliance row for an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_findings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Response>, StorageError>;

    /// Set the resolution flag only.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn set_resolution(
        &self,
        id: ResponseId,
        resolution: FindingResolution,
    ) -> Result<(), StorageError>;

    /// Delete all rows for a session, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_for_session(&self, session_id: SessionId) -> Result<u64, StorageError>;
}

/// Repository contract for generated narrative reports.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_report(&self, session_id: SessionId)
    -> Result<Option<NarrativeReport>, StorageError>;

    /// Store a report unless one already exists; returns whichever is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn insert_report(&self, report: &NarrativeReport)
    -> Result<NarrativeReport, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_report(&self, session_id: SessionId) -> Result<bool, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    templates: Arc<Mutex<HashMap<TemplateId, Template>>>,
    sessions: Arc<Mutex<HashMap<SessionId, AuditSession>>>,
    responses: Arc<Mutex<HashMap<(SessionId, QuestionId), Response>>>,
    reports: Arc<Mutex<HashMap<SessionId, NarrativeReport>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl TemplateRepository for InMemoryRepository {
    async fn upsert_template(&self, template: &Template) -> Result<(), StorageError> {
        let mut guard = self.templates.lock().map_err(poisoned)?;
        guard.insert(template.id(), template.clone());
        Ok(())
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StorageError> {
        let guard = self.templates.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_templates(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Template>, StorageError> {
        let guard = self.templates.lock().map_err(poisoned)?;
        let mut out: Vec<Template> = guard
            .values()
            .filter(|t| t.organization_id() == organization_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()).then(a.name().cmp(b.name())));
        Ok(out)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &AuditSession) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if guard.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &AuditSession) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        match guard.get_mut(&session.id()) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<AuditSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<AuditSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut out: Vec<AuditSession> =
            guard.values().filter(|s| query.matches(s)).cloned().collect();
        out.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.id().cmp(&a.id())));
        if let Some(limit) = query.limit {
            out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(out)
    }

    async fn count_sessions_for_template(
        &self,
        template_id: TemplateId,
    ) -> Result<u64, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let count = guard
            .values()
            .filter(|s| s.template_id() == template_id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, StorageError> {
        let removed = self.sessions.lock().map_err(poisoned)?.remove(&id).is_some();
        if removed {
            self.responses
                .lock()
                .map_err(poisoned)?
                .retain(|(session_id, _), _| *session_id != id);
            self.reports.lock().map_err(poisoned)?.remove(&id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ResponseRepository for InMemoryRepository {
    async fn upsert_response(&self, response: &Response) -> Result<Response, StorageError> {
        let mut guard = self.responses.lock().map_err(poisoned)?;
        let key = (response.session_id, response.question_id.clone());
        let stored = match guard.get(&key) {
            Some(existing) => Response {
                status: response.status.clone(),
                notes: response.notes.clone(),
                updated_at: response.updated_at,
                ..existing.clone()
            },
            None => response.clone(),
        };
        guard.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_response(
        &self,
        session_id: SessionId,
        question_id: &QuestionId,
    ) -> Result<Option<Response>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        Ok(guard.get(&(session_id, question_id.clone())).cloned())
    }

    async fn get_response_by_id(&self, id: ResponseId) -> Result<Option<Response>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        Ok(guard.values().find(|r| r.id == id).cloned())
    }

    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<Response>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        let mut out: Vec<Response> = guard
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.question_id.cmp(&b.question_id)));
        Ok(out)
    }

    async fn list_findings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Response>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        let mut out: Vec<Response> = guard
            .values()
            .filter(|r| r.organization_id == organization_id && r.severity().is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn set_resolution(
        &self,
        id: ResponseId,
        resolution: FindingResolution,
    ) -> Result<(), StorageError> {
        let mut guard = self.responses.lock().map_err(poisoned)?;
        let row = guard
            .values_mut()
            .find(|r| r.id == id)
            .ok_or(StorageError::NotFound)?;
        row.resolution = resolution;
        Ok(())
    }

    async fn delete_for_session(&self, session_id: SessionId) -> Result<u64, StorageError> {
        let mut guard = self.responses.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|(sid, _), _| *sid != session_id);
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl ReportRepository for InMemoryRepository {
    async fn get_report(
        &self,
        session_id: SessionId,
    ) -> Result<Option<NarrativeReport>, StorageError> {
        let guard = self.reports.lock().map_err(poisoned)?;
        Ok(guard.get(&session_id).cloned())
    }

    async fn insert_report(
        &self,
        report: &NarrativeReport,
    ) -> Result<NarrativeReport, StorageError> {
        let mut guard = self.reports.lock().map_err(poisoned)?;
        Ok(guard
            .entry(report.session_id)
            .or_insert_with(|| report.clone())
            .clone())
    }

    async fn delete_report(&self, session_id: SessionId) -> Result<bool, StorageError> {
        let mut guard = self.reports.lock().map_err(poisoned)?;
        Ok(guard.remove(&session_id).is_some())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub templates: Arc<dyn TemplateRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub responses: Arc<dyn ResponseRepository>,
    pub reports: Arc<dyn ReportRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            templates: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            responses: Arc::new(repo.clone()),
            reports: Arc::new(repo),
        }
    }
}
