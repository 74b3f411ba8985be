//! Type dispatcher: routes each payload to its persistence call.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;

use inkwell_core::{Character, Document, Project, Settings};

use crate::error::{DispatchError, PersistError, panic_message};
use crate::operation::SavePayload;

/// External storage, one async call per entity type.
///
/// Implementations report failures as [`PersistError`]; the queue records
/// them and decides about retries.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    async fn save_document(&self, document: &Document) -> Result<(), PersistError>;

    async fn save_character(&self, character: &Character) -> Result<(), PersistError>;

    async fn save_project(&self, project: &Project) -> Result<(), PersistError>;

    /// Persist a single settings key.
    async fn save_setting(&self, key: &str, value: &Value) -> Result<(), PersistError>;
}

#[async_trait::async_trait]
impl<P> Persistence for Arc<P>
where
    P: Persistence + ?Sized,
{
    async fn save_document(&self, document: &Document) -> Result<(), PersistError> {
        (**self).save_document(document).await
    }

    async fn save_character(&self, character: &Character) -> Result<(), PersistError> {
        (**self).save_character(character).await
    }

    async fn save_project(&self, project: &Project) -> Result<(), PersistError> {
        (**self).save_project(project).await
    }

    async fn save_setting(&self, key: &str, value: &Value) -> Result<(), PersistError> {
        (**self).save_setting(key, value).await
    }
}

/// Maps an operation's payload to exactly one persistence path.
#[derive(Clone)]
pub struct TypeDispatcher {
    persistence: Arc<dyn Persistence>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for TypeDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TypeDispatcher {
    pub fn new(persistence: Arc<dyn Persistence>, timeout: Option<Duration>) -> Self {
        Self {
            persistence,
            timeout,
        }
    }

    /// Persist `payload`, reading the entity as it is right now.
    ///
    /// Without a timeout a hung persistence call is awaited forever. A
    /// panicking persistence call is reported as [`DispatchError::Panicked`]
    /// so the worker survives it.
    pub async fn dispatch(&self, payload: &SavePayload) -> Result<(), DispatchError> {
        let guarded = AssertUnwindSafe(self.persist(payload)).catch_unwind();
        let outcome = match self.timeout {
            None => guarded.await,
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| DispatchError::TimedOut(limit))?,
        };

        outcome.unwrap_or_else(|panic| {
            Err(DispatchError::Panicked(
                panic_message(panic.as_ref()).to_string(),
            ))
        })
    }

    async fn persist(&self, payload: &SavePayload) -> Result<(), DispatchError> {
        match payload {
            SavePayload::Document(document) => {
                let document = document.snapshot();
                self.persistence.save_document(&document).await?;
            }
            SavePayload::Character(character) => {
                let character = character.snapshot();
                self.persistence.save_character(&character).await?;
            }
            SavePayload::Project(project) => {
                let project = project.snapshot();
                self.persistence.save_project(&project).await?;
            }
            SavePayload::Settings(settings) => {
                self.persist_settings(settings.snapshot()).await?;
            }
        }
        Ok(())
    }

    /// One call per key, in the order the keys were set. Not atomic: keys
    /// written before a failing key stay written.
    async fn persist_settings(&self, settings: Settings) -> Result<(), DispatchError> {
        let mut written = Vec::with_capacity(settings.len());

        for (key, value) in settings.iter() {
            if let Err(source) = self.persistence.save_setting(key, value).await {
                if written.is_empty() {
                    return Err(DispatchError::Persistence(source));
                }
                return Err(DispatchError::PartialSettings {
                    written,
                    key: key.clone(),
                    source,
                });
            }
            written.push(key.clone());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::in_memory::InMemoryPersistence;
    use crate::operation::Shared;

    /// Fails every settings key listed in `failing`.
    struct RejectKeys {
        inner: InMemoryPersistence,
        failing: Vec<&'static str>,
        attempted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Persistence for RejectKeys {
        async fn save_document(&self, document: &Document) -> Result<(), PersistError> {
            self.inner.save_document(document).await
        }

        async fn save_character(&self, character: &Character) -> Result<(), PersistError> {
            self.inner.save_character(character).await
        }

        async fn save_project(&self, project: &Project) -> Result<(), PersistError> {
            self.inner.save_project(project).await
        }

        async fn save_setting(&self, key: &str, value: &Value) -> Result<(), PersistError> {
            self.attempted.lock().unwrap().push(key.to_string());
            if self.failing.iter().any(|k| *k == key) {
                return Err(PersistError::new(format!("cannot store {key}")));
            }
            self.inner.save_setting(key, value).await
        }
    }

    fn settings() -> Settings {
        Settings::new()
            .with("autosave", json!(true))
            .unwrap()
            .with("font_size", json!(16))
            .unwrap()
            .with("theme", json!("dark"))
            .unwrap()
    }

    #[tokio::test]
    async fn settings_failure_keeps_earlier_keys() {
        let persistence = Arc::new(RejectKeys {
            inner: InMemoryPersistence::new(),
            failing: vec!["theme"],
            attempted: Mutex::new(Vec::new()),
        });
        let dispatcher = TypeDispatcher::new(persistence.clone(), None);

        let err = dispatcher
            .dispatch(&SavePayload::from(settings()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::PartialSettings {
                written: vec!["autosave".into(), "font_size".into()],
                key: "theme".into(),
                source: PersistError::new("cannot store theme"),
            }
        );
        assert_eq!(persistence.inner.setting("autosave"), Some(json!(true)));
        assert_eq!(persistence.inner.setting("font_size"), Some(json!(16)));
        assert_eq!(persistence.inner.setting("theme"), None);
    }

    #[tokio::test]
    async fn first_key_failure_is_a_plain_persistence_error() {
        let persistence = Arc::new(RejectKeys {
            inner: InMemoryPersistence::new(),
            failing: vec!["autosave"],
            attempted: Mutex::new(Vec::new()),
        });
        let dispatcher = TypeDispatcher::new(persistence.clone(), None);

        let err = dispatcher
            .dispatch(&SavePayload::from(settings()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Persistence(PersistError::new("cannot store autosave"))
        );
        assert_eq!(*persistence.attempted.lock().unwrap(), vec!["autosave"]);
    }

    #[tokio::test]
    async fn settings_keys_are_written_in_insertion_order() {
        let persistence = Arc::new(RejectKeys {
            inner: InMemoryPersistence::new(),
            failing: vec!["font_size"],
            attempted: Mutex::new(Vec::new()),
        });
        let dispatcher = TypeDispatcher::new(persistence.clone(), None);
        let settings = Settings::new()
            .with("theme", json!("dark"))
            .unwrap()
            .with("font_size", json!(16))
            .unwrap()
            .with("autosave", json!(true))
            .unwrap();

        let err = dispatcher
            .dispatch(&SavePayload::from(settings))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::PartialSettings { ref written, .. } if written == &vec!["theme".to_string()]
        ));
        assert_eq!(
            *persistence.attempted.lock().unwrap(),
            vec!["theme", "font_size"]
        );
        assert_eq!(persistence.inner.setting("autosave"), None);
    }

    #[tokio::test]
    async fn payload_is_read_at_dispatch_time() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let dispatcher = TypeDispatcher::new(persistence.clone(), None);
        let project = Shared::new(Project::new("Working title").unwrap());
        let payload = SavePayload::from(project.clone());

        project.update(|p| p.title = "Final title".into());
        dispatcher.dispatch(&payload).await.unwrap();

        let id = project.read(|p| p.id);
        assert_eq!(persistence.project(&id).unwrap().title, "Final title");
    }
}
