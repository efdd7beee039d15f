use audit_core::model::{
    FindingResolution, OrganizationId, QuestionId, Response, ResponseId, ResponseStatus,
    SessionId,
};

use super::SqliteRepository;
use super::mapping::{db_err, map_response_row};
use crate::repository::{ResponseRepository, StorageError};

const RESPONSE_COLUMNS: &str =
    "id, organization_id, session_id, question_id, status, notes, resolution, created_at, updated_at";

#[async_trait::async_trait]
impl ResponseRepository for SqliteRepository {
    async fn upsert_response(&self, response: &Response) -> Result<Response, StorageError> {
        let sql = format!(
            r"
            INSERT INTO audit_responses (
                id, organization_id, session_id, question_id, status, notes, resolution,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(session_id, question_id) DO UPDATE SET
                status = excluded.status,
                notes = excluded.notes,
                updated_at = excluded.updated_at
            RETURNING {RESPONSE_COLUMNS}
            "
        );

        let row = sqlx::query(&sql)
            .bind(response.id.to_string())
            .bind(response.organization_id.to_string())
            .bind(response.session_id.to_string())
            .bind(response.question_id.as_str())
            .bind(response.status.as_ref().map(ResponseStatus::as_str))
            .bind(response.notes.as_deref())
            .bind(response.resolution.as_str())
            .bind(response.created_at)
            .bind(response.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        map_response_row(&row)
    }

    async fn get_response(
        &self,
        session_id: SessionId,
        question_id: &QuestionId,
    ) -> Result<Option<Response>, StorageError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM audit_responses WHERE session_id = ?1 AND question_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(session_id.to_string())
            .bind(question_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_response_row).transpose()
    }

    async fn get_response_by_id(&self, id: ResponseId) -> Result<Option<Response>, StorageError> {
        let sql = format!("SELECT {RESPONSE_COLUMNS} FROM audit_responses WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_response_row).transpose()
    }

    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<Response>, StorageError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM audit_responses
             WHERE session_id = ?1
             ORDER BY created_at ASC, question_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_response_row).collect()
    }

    async fn list_findings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Response>, StorageError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM audit_responses
             WHERE organization_id = ?1 AND status IN (?2, ?3)
             ORDER BY updated_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(organization_id.to_string())
            .bind(ResponseStatus::WARNING)
            .bind(ResponseStatus::NON_COMPLIANCE)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_response_row).collect()
    }

    async fn set_resolution(
        &self,
        id: ResponseId,
        resolution: FindingResolution,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE audit_responses SET resolution = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(resolution.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_for_session(&self, session_id: SessionId) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM audit_responses WHERE session_id = ?1")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
