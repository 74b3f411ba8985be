//! Documents: chapters, scenes and notes inside a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{DocumentId, ProjectId};

/// A rich-text document.
///
/// `content` is the editor's JSON document tree; text lives in `"text"`
/// string leaves, everything else is structure/marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub project_id: ProjectId,
    pub title: String,
    pub content: Value,
    pub word_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("document title must not be empty"));
        }

        Ok(Self {
            id: DocumentId::new(),
            project_id,
            title,
            content: Value::Null,
            word_count: 0,
            updated_at: Utc::now(),
        })
    }

    /// Replace the body and recompute the word count.
    pub fn set_content(&mut self, content: Value) {
        self.word_count = count_words(&content);
        self.content = content;
        self.updated_at = Utc::now();
    }

    pub fn rename(&mut self, title: impl Into<String>) -> DomainResult<()> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("document title must not be empty"));
        }
        self.title = title;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn count_words(node: &Value) -> u32 {
    match node {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match (key.as_str(), value) {
                ("text", Value::String(text)) => text.split_whitespace().count() as u32,
                _ => count_words(value),
            })
            .sum(),
        Value::Array(items) => items.iter().map(count_words).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_title_is_rejected() {
        let err = Document::new(ProjectId::new(), "   ").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn word_count_walks_text_leaves() {
        let mut doc = Document::new(ProjectId::new(), "Chapter 1").unwrap();
        doc.set_content(json!({
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [{ "type": "text", "text": "It was a dark" }] },
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "and stormy", "marks": [{ "type": "bold" }] },
                    { "type": "text", "text": " night." }
                ]}
            ]
        }));

        assert_eq!(doc.word_count, 7);
    }

    #[test]
    fn rename_keeps_identity() {
        let mut doc = Document::new(ProjectId::new(), "Draft").unwrap();
        let id = doc.id;
        doc.rename("Prologue").unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.title, "Prologue");
    }
}
