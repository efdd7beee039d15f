use audit_core::model::{OrganizationId, Template, TemplateId, encode_sections};

use super::SqliteRepository;
use super::mapping::{db_err, map_template_row, ser};
use crate::repository::{StorageError, TemplateRepository};

const TEMPLATE_COLUMNS: &str =
    "id, organization_id, name, category, version, is_active, sections, created_at, updated_at";

#[async_trait::async_trait]
impl TemplateRepository for SqliteRepository {
    async fn upsert_template(&self, template: &Template) -> Result<(), StorageError> {
        let sections = encode_sections(template.sections()).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO audit_templates (id, organization_id, name, category, version, is_active, sections, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                version = excluded.version,
                is_active = excluded.is_active,
                sections = excluded.sections,
                updated_at = excluded.updated_at
            ",
        )
        .bind(template.id().to_string())
        .bind(template.organization_id().to_string())
        .bind(template.name())
        .bind(template.category())
        .bind(i64::from(template.version()))
        .bind(i64::from(template.is_active()))
        .bind(sections)
        .bind(template.created_at())
        .bind(template.updated_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StorageError> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM audit_templates WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_template_row).transpose()
    }

    async fn list_templates(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Template>, StorageError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM audit_templates
             WHERE organization_id = ?1
             ORDER BY updated_at DESC, name ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(organization_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            templates.push(map_template_row(&row)?);
        }
        Ok(templates)
    }
}
