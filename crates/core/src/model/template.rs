use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{OrganizationId, QuestionId, TemplateId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("template name cannot be empty")]
    EmptyName,

    #[error("question id cannot be empty (section {section:?})")]
    EmptyQuestionId { section: String },

    #[error("question {id} has no text")]
    EmptyQuestionText { id: QuestionId },

    #[error("question id {id} is used more than once")]
    DuplicateQuestionId { id: QuestionId },
}

//
// ─── QUESTIONS & SECTIONS ──────────────────────────────────────────────────────
//

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Compliance / warning / non-compliance verdict.
    #[default]
    YesNo,
    Text,
    Score,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
}

impl Question {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: QuestionId::new(id),
            text: text.into(),
            kind,
        }
    }
}

/// Named group of questions. Names are display labels and need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Section {
    #[must_use]
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }
}

//
// ─── TEMPLATE ──────────────────────────────────────────────────────────────────
//

/// Reusable audit definition owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: TemplateId,
    organization_id: OrganizationId,
    name: String,
    category: String,
    version: u32,
    is_active: bool,
    sections: Vec<Section>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Template {
    /// Creates a new, active, version 1 template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if the name is blank or question ids are blank or
    /// repeated anywhere in the template.
    pub fn new(
        id: TemplateId,
        organization_id: OrganizationId,
        name: impl Into<String>,
        category: impl Into<String>,
        sections: Vec<Section>,
        now: DateTime<Utc>,
    ) -> Result<Self, TemplateError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        validate_sections(&sections)?;

        Ok(Self {
            id,
            organization_id,
            name,
            category: category.into().trim().to_owned(),
            version: 1,
            is_active: true,
            sections,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrate a template from storage without re-running authoring checks.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: TemplateId,
        organization_id: OrganizationId,
        name: String,
        category: String,
        version: u32,
        is_active: bool,
        sections: Vec<Section>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            organization_id,
            name,
            category,
            version,
            is_active,
            sections,
            created_at,
            updated_at,
        }
    }

    /// Replace the authored content and bump the version.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` under the same rules as [`Template::new`].
    pub fn revise(
        &mut self,
        name: impl Into<String>,
        category: impl Into<String>,
        sections: Vec<Section>,
        now: DateTime<Utc>,
    ) -> Result<(), TemplateError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        validate_sections(&sections)?;

        self.name = name;
        self.category = category.into().trim().to_owned();
        self.sections = sections;
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
        Ok(())
    }

    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;
        self.updated_at = now;
    }

    #[must_use]
    pub fn id(&self) -> TemplateId {
        self.id
    }

    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total number of questions across all sections.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }
}

fn validate_sections(sections: &[Section]) -> Result<(), TemplateError> {
    let mut seen = HashSet::new();
    for section in sections {
        for question in &section.questions {
            if question.id.is_blank() {
                return Err(TemplateError::EmptyQuestionId {
                    section: section.name.clone(),
                });
            }
            if question.text.trim().is_empty() {
                return Err(TemplateError::EmptyQuestionText {
                    id: question.id.clone(),
                });
            }
            if !seen.insert(question.id.clone()) {
                return Err(TemplateError::DuplicateQuestionId {
                    id: question.id.clone(),
                });
            }
        }
    }
    Ok(())
}

//
// ─── SECTION DOCUMENT ENCODING ─────────────────────────────────────────────────
//

/// Encode sections as the JSON document stored alongside a template.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if encoding fails.
pub fn encode_sections(sections: &[Section]) -> Result<String, serde_json::Error> {
    serde_json::to_string(sections)
}

/// Decode a stored sections document, tolerating partially-authored content.
///
/// A document that is not an array yields no sections. A section that is not an
/// object is skipped; a section whose `questions` is missing or not an array is
/// kept with no questions; a question that does not decode is skipped.
#[must_use]
pub fn decode_sections(raw: &str) -> Vec<Section> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "template sections are not valid JSON; treating as empty");
            return Vec::new();
        }
    };
    sections_from_value(&value)
}

/// Same as [`decode_sections`], starting from an already parsed value.
#[must_use]
pub fn sections_from_value(value: &Value) -> Vec<Section> {
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            tracing::warn!("template sections are not an array; treating as empty");
        }
        return Vec::new();
    };

    let mut sections = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            tracing::warn!(index, "skipping malformed template section");
            continue;
        };
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let questions = match object.get("questions").and_then(Value::as_array) {
            Some(raw_questions) => raw_questions
                .iter()
                .filter_map(|raw| match serde_json::from_value::<Question>(raw.clone()) {
                    Ok(question) => Some(question),
                    Err(e) => {
                        tracing::warn!(section = %name, error = %e, "skipping malformed question");
                        None
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        sections.push(Section { name, questions });
    }
    sections
}
