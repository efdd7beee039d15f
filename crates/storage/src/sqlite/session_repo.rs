use audit_core::model::{AuditSession, SessionId, TemplateId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, map_session_row, ser};
use crate::repository::{SessionQuery, SessionRepository, StorageError};

const SESSION_COLUMNS: &str = "id, organization_id, template_id, template_name, auditor_id, \
     auditor_name, auditor_email, department, due_date, status, progress, created_at, \
     started_at, completed_at";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &AuditSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO audit_sessions (
                id, organization_id, template_id, template_name, auditor_id, auditor_name,
                auditor_email, department, due_date, status, progress, created_at,
                started_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )
        .bind(session.id().to_string())
        .bind(session.organization_id().to_string())
        .bind(session.template_id().to_string())
        .bind(session.template_name())
        .bind(session.auditor().id.to_string())
        .bind(session.auditor().name.as_str())
        .bind(session.auditor().email.as_deref())
        .bind(session.department())
        .bind(session.due_date())
        .bind(session.status().as_str())
        .bind(i64::from(session.progress()))
        .bind(session.created_at())
        .bind(session.started_at())
        .bind(session.completed_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn update_session(&self, session: &AuditSession) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE audit_sessions SET
                template_name = ?2,
                auditor_id = ?3,
                auditor_name = ?4,
                auditor_email = ?5,
                department = ?6,
                due_date = ?7,
                status = ?8,
                progress = ?9,
                started_at = ?10,
                completed_at = ?11
            WHERE id = ?1
            ",
        )
        .bind(session.id().to_string())
        .bind(session.template_name())
        .bind(session.auditor().id.to_string())
        .bind(session.auditor().name.as_str())
        .bind(session.auditor().email.as_deref())
        .bind(session.department())
        .bind(session.due_date())
        .bind(session.status().as_str())
        .bind(i64::from(session.progress()))
        .bind(session.started_at())
        .bind(session.completed_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<AuditSession>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM audit_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<AuditSession>, StorageError> {
        let mut sql = format!("SELECT {SESSION_COLUMNS} FROM audit_sessions WHERE organization_id = ?1");

        let mut bind_index = 2;
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
            sql.push_str(&bind_index.to_string());
        }

        let mut q = sqlx::query(&sql).bind(query.organization_id.to_string());
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            q = q.bind(i64::from(limit));
        }

        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn count_sessions_for_template(
        &self,
        template_id: TemplateId,
    ) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_sessions WHERE template_id = ?1")
            .bind(template_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let n: i64 = row.try_get("n").map_err(ser)?;
        u64::try_from(n).map_err(|_| StorageError::Serialization(format!("invalid count: {n}")))
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM audit_sessions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }
}
