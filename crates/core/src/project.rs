//! Writing projects (a novel, a short-story collection, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::ProjectId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub genre: Option<String>,
    pub target_word_count: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(title: impl Into<String>) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("project title must not be empty"));
        }

        Ok(Self {
            id: ProjectId::new(),
            title,
            description: String::new(),
            genre: None,
            target_word_count: None,
            updated_at: Utc::now(),
        })
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }
}

impl Entity for Project {
    type Id = ProjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
