#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use inkwell_core::{Character, Document, Project, ProjectId};
use inkwell_save_queue::{InMemoryPersistence, PersistError, Persistence, SaveQueueConfig};

/// One persistence call as seen by [`ScriptedPersistence`].
#[derive(Debug, Clone)]
pub struct Call {
    /// Document title, character name, project title or settings key.
    pub label: String,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
enum Script {
    FailTimes(u32),
    FailAlways,
    Hang,
    Slow(Duration),
    Panic,
}

/// Persistence double: logs every call, fails, stalls or panics on demand, and
/// stores successful writes in an [`InMemoryPersistence`].
#[derive(Debug, Default)]
pub struct ScriptedPersistence {
    pub inner: InMemoryPersistence,
    calls: Mutex<Vec<Call>>,
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_times(&self, label: &str, times: u32) {
        self.scripts
            .lock()
            .unwrap()
            .insert(label.to_string(), Script::FailTimes(times));
    }

    pub fn fail_always(&self, label: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(label.to_string(), Script::FailAlways);
    }

    pub fn hang(&self, label: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(label.to_string(), Script::Hang);
    }

    /// Succeed, but only after `delay`.
    pub fn slow(&self, label: &str, delay: Duration) {
        self.scripts
            .lock()
            .unwrap()
            .insert(label.to_string(), Script::Slow(delay));
    }

    pub fn panic_on(&self, label: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(label.to_string(), Script::Panic);
    }

    pub fn recover(&self, label: &str) {
        self.scripts.lock().unwrap().remove(label);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }

    pub fn calls_for(&self, label: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.label == label)
            .collect()
    }

    /// Log the call and apply the script for `label`.
    async fn attempt(&self, label: &str) -> Result<(), PersistError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                label: label.to_string(),
                at: Instant::now(),
            });
            calls.iter().filter(|c| c.label == label).count()
        };

        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(label) {
                Some(Script::FailTimes(0)) => None,
                Some(Script::FailTimes(n)) => {
                    *n -= 1;
                    Some(Script::FailTimes(*n + 1))
                }
                Some(other) => Some(*other),
                None => None,
            }
        };

        match script {
            None => Ok(()),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(Script::Panic) => panic!("{label}: storage exploded"),
            Some(_) => Err(PersistError::new(format!(
                "{label}: storage unavailable (attempt {attempt})"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Persistence for ScriptedPersistence {
    async fn save_document(&self, document: &Document) -> Result<(), PersistError> {
        self.attempt(&document.title).await?;
        self.inner.save_document(document).await
    }

    async fn save_character(&self, character: &Character) -> Result<(), PersistError> {
        self.attempt(&character.name).await?;
        self.inner.save_character(character).await
    }

    async fn save_project(&self, project: &Project) -> Result<(), PersistError> {
        self.attempt(&project.title).await?;
        self.inner.save_project(project).await
    }

    async fn save_setting(&self, key: &str, value: &Value) -> Result<(), PersistError> {
        self.attempt(key).await?;
        self.inner.save_setting(key, value).await
    }
}

pub fn document(title: &str) -> Document {
    Document::new(ProjectId::new(), title).unwrap()
}

pub fn character(name: &str) -> Character {
    Character::new(ProjectId::new(), name).unwrap()
}

pub fn project(title: &str) -> Project {
    Project::new(title).unwrap()
}

/// Short delays so paused-clock tests read naturally.
pub fn test_config() -> SaveQueueConfig {
    SaveQueueConfig::default()
        .with_max_retries(3)
        .with_retry_delay(Duration::from_millis(500))
        .with_batch_size(5)
        .with_cycle_pause(Duration::from_millis(10))
}
