use audit_core::model::{NarrativeReport, SessionId};

use super::SqliteRepository;
use super::mapping::{db_err, map_report_row};
use crate::repository::{ReportRepository, StorageError};

#[async_trait::async_trait]
impl ReportRepository for SqliteRepository {
    async fn get_report(
        &self,
        session_id: SessionId,
    ) -> Result<Option<NarrativeReport>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT session_id, organization_id, report_content, model, created_at
            FROM ai_audit_reports
            WHERE session_id = ?1
            ",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_report_row).transpose()
    }

    async fn insert_report(
        &self,
        report: &NarrativeReport,
    ) -> Result<NarrativeReport, StorageError> {
        sqlx::query(
            r"
            INSERT INTO ai_audit_reports (session_id, organization_id, report_content, model, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(session_id) DO NOTHING
            ",
        )
        .bind(report.session_id.to_string())
        .bind(report.organization_id.to_string())
        .bind(report.content.as_str())
        .bind(report.model.as_deref())
        .bind(report.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_report(report.session_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn delete_report(&self, session_id: SessionId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM ai_audit_reports WHERE session_id = ?1")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }
}
