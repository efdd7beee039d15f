//! Linearizes a template's sections into the order auditors step through.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Question, QuestionId, Section, Template};

/// A question tagged with its section and its position in the flattened list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatQuestion {
    pub question: Question,
    pub section: String,
    /// Zero-based position; shown to users as "Module {index + 1} of {total}".
    pub index: usize,
}

impl FlatQuestion {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.question.id
    }
}

/// Flatten a template in section order, then question order.
#[must_use]
pub fn flatten(template: &Template) -> Vec<FlatQuestion> {
    flatten_sections(template.sections())
}

/// Flatten raw sections. Empty sections contribute nothing.
#[must_use]
pub fn flatten_sections(sections: &[Section]) -> Vec<FlatQuestion> {
    sections
        .iter()
        .flat_map(|section| {
            section
                .questions
                .iter()
                .map(move |question| (section.name.as_str(), question))
        })
        .enumerate()
        .map(|(index, (section, question))| FlatQuestion {
            question: question.clone(),
            section: section.to_owned(),
            index,
        })
        .collect()
}

/// Lookup table from question id to its flattened entry.
#[must_use]
pub fn index_by_id(questions: &[FlatQuestion]) -> HashMap<&QuestionId, &FlatQuestion> {
    questions.iter().map(|q| (q.id(), q)).collect()
}
