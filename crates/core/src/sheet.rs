//! Keyed view of a session's responses, computed from the stored rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FindingResolution, QuestionId, Response, ResponseStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetEntry {
    pub status: Option<ResponseStatus>,
    pub notes: Option<String>,
    pub resolution: FindingResolution,
}

/// Question id to current answer. Always rebuilt from rows, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseSheet {
    entries: BTreeMap<QuestionId, SheetEntry>,
}

impl ResponseSheet {
    /// Build the sheet. If rows repeat a question, the most recently updated wins.
    #[must_use]
    pub fn from_rows(rows: &[Response]) -> Self {
        let mut latest: BTreeMap<QuestionId, &Response> = BTreeMap::new();
        for row in rows {
            latest
                .entry(row.question_id.clone())
                .and_modify(|current| {
                    if row.updated_at >= current.updated_at {
                        *current = row;
                    }
                })
                .or_insert(row);
        }

        let entries = latest
            .into_iter()
            .map(|(id, row)| {
                (
                    id,
                    SheetEntry {
                        status: row.status.clone(),
                        notes: row.notes.clone(),
                        resolution: row.resolution,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> Option<&SheetEntry> {
        self.entries.get(question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &SheetEntry)> {
        self.entries.iter()
    }

    /// Count of entries currently marked non-compliant.
    #[must_use]
    pub fn non_compliance_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.status == Some(ResponseStatus::NonCompliance))
            .count()
    }
}
