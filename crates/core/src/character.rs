//! Character sheets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{CharacterId, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub project_id: ProjectId,
    pub name: String,
    pub role: Option<String>,
    pub description: String,
    pub traits: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("character name must not be empty"));
        }

        Ok(Self {
            id: CharacterId::new(),
            project_id,
            name,
            role: None,
            description: String::new(),
            traits: Vec::new(),
            updated_at: Utc::now(),
        })
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Add a trait; duplicates (case-insensitive) are ignored.
    pub fn add_trait(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !self.traits.iter().any(|t| t.eq_ignore_ascii_case(&value)) {
            self.traits.push(value);
            self.updated_at = Utc::now();
        }
    }
}

impl Entity for Character {
    type Id = CharacterId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
