use std::str::FromStr;

use audit_core::model::{
    AuditSession, AuditorRef, FindingResolution, NarrativeReport, QuestionId, Response,
    ResponseStatus, SessionStatus, Template, decode_sections,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, surfacing unique-key violations as `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn parse_id<T>(field: &'static str, raw: &str) -> Result<T, StorageError>
where
    T: FromStr,
{
    raw.parse::<T>()
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

fn id_column<T: FromStr>(row: &SqliteRow, column: &'static str) -> Result<T, StorageError> {
    let raw: String = row.try_get(column).map_err(ser)?;
    parse_id(column, &raw)
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_template_row(row: &SqliteRow) -> Result<Template, StorageError> {
    let sections_raw: String = row.try_get("sections").map_err(ser)?;
    Ok(Template::from_persisted(
        id_column(row, "id")?,
        id_column(row, "organization_id")?,
        row.try_get("name").map_err(ser)?,
        row.try_get("category").map_err(ser)?,
        u32_from_i64("version", row.try_get::<i64, _>("version").map_err(ser)?)?,
        row.try_get::<i64, _>("is_active").map_err(ser)? != 0,
        decode_sections(&sections_raw),
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<AuditSession, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let auditor = AuditorRef {
        id: id_column(row, "auditor_id")?,
        name: row.try_get("auditor_name").map_err(ser)?,
        email: row.try_get("auditor_email").map_err(ser)?,
    };

    AuditSession::from_persisted(
        id_column(row, "id")?,
        id_column(row, "organization_id")?,
        id_column(row, "template_id")?,
        row.try_get("template_name").map_err(ser)?,
        auditor,
        row.try_get("department").map_err(ser)?,
        row.try_get("due_date").map_err(ser)?,
        SessionStatus::parse(&status).map_err(ser)?,
        u32_from_i64("progress", row.try_get::<i64, _>("progress").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_response_row(row: &SqliteRow) -> Result<Response, StorageError> {
    let status: Option<String> = row.try_get("status").map_err(ser)?;
    let resolution: String = row.try_get("resolution").map_err(ser)?;
    let question_id: String = row.try_get("question_id").map_err(ser)?;

    Ok(Response {
        id: id_column(row, "id")?,
        organization_id: id_column(row, "organization_id")?,
        session_id: id_column(row, "session_id")?,
        question_id: QuestionId::new(question_id),
        status: status.as_deref().and_then(ResponseStatus::parse),
        notes: row.try_get("notes").map_err(ser)?,
        resolution: FindingResolution::parse(&resolution)
            .ok_or_else(|| StorageError::Serialization(format!("invalid resolution: {resolution}")))?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_report_row(row: &SqliteRow) -> Result<NarrativeReport, StorageError> {
    Ok(NarrativeReport {
        session_id: id_column(row, "session_id")?,
        organization_id: id_column(row, "organization_id")?,
        content: row.try_get("report_content").map_err(ser)?,
        model: row.try_get("model").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
