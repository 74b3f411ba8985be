//! User/application settings: a flat key/value bag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

/// Settings to persist, one entry per key.
///
/// Keys iterate in the order they were first set; persistence walks them
/// in that order. Overwriting a key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> DomainResult<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::validation("settings key must not be empty"));
        }
        self.0.insert(key, value);
        Ok(())
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> DomainResult<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
