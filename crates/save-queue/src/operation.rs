//! Operation records: the unit of work handled by the save queue.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use inkwell_core::{Character, Document, Project, Settings};

/// Unique operation identifier: `{kind}_{unix_millis}_{suffix}`.
///
/// The suffix comes from the random tail of a UUIDv7, so identifiers are
/// never reused within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub(crate) fn generate(kind: OperationKind, at: DateTime<Utc>) -> Self {
        let uuid = Uuid::now_v7().simple().to_string();
        let suffix = &uuid[uuid.len() - 9..];
        Self(format!("{}_{}_{}", kind.as_str(), at.timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of entity an operation persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Document,
    Character,
    Project,
    Settings,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Document => "document",
            OperationKind::Character => "character",
            OperationKind::Project => "project",
            OperationKind::Settings => "settings",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation lifecycle.
///
/// `Pending -> Saving -> {Saved | Pending (retry) | Error}`. `Saved` and
/// `Error` only change through the queue's control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Saving,
    Saved,
    Error,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Saving => "saving",
            OperationStatus::Saved => "saved",
            OperationStatus::Error => "error",
        }
    }

    /// Pending or saving.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Saving)
    }
}

/// A handle to an entity shared between the caller and the queue.
///
/// The queue reads the entity when the operation is dispatched, not when it
/// is enqueued: edits made in between are what gets persisted.
#[derive(Debug, Default)]
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Mutate the entity in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.0.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.read(T::clone)
    }

    /// True when both handles point at the same entity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Serialize> Serialize for Shared<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.read(|value| value.serialize(serializer))
    }
}

/// What to persist; one variant per [`OperationKind`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SavePayload {
    Document(Shared<Document>),
    Character(Shared<Character>),
    Project(Shared<Project>),
    Settings(Shared<Settings>),
}

impl SavePayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            SavePayload::Document(_) => OperationKind::Document,
            SavePayload::Character(_) => OperationKind::Character,
            SavePayload::Project(_) => OperationKind::Project,
            SavePayload::Settings(_) => OperationKind::Settings,
        }
    }
}

macro_rules! impl_payload_from {
    ($variant:ident, $entity:ty) => {
        impl From<Shared<$entity>> for SavePayload {
            fn from(value: Shared<$entity>) -> Self {
                SavePayload::$variant(value)
            }
        }

        impl From<$entity> for SavePayload {
            fn from(value: $entity) -> Self {
                SavePayload::$variant(Shared::new(value))
            }
        }
    };
}

impl_payload_from!(Document, Document);
impl_payload_from!(Character, Character);
impl_payload_from!(Project, Project);
impl_payload_from!(Settings, Settings);

/// One requested save and its progress.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub id: OperationId,
    pub kind: OperationKind,
    pub payload: SavePayload,
    pub created_at: DateTime<Utc>,
    pub status: OperationStatus,
    pub retry_count: u32,
    /// Last failure message; cleared only by a retry reset.
    pub error: Option<String>,
}

impl OperationRecord {
    pub(crate) fn new(payload: SavePayload) -> Self {
        let created_at = Utc::now();
        let kind = payload.kind();
        Self {
            id: OperationId::generate(kind, created_at),
            kind,
            payload,
            created_at,
            status: OperationStatus::Pending,
            retry_count: 0,
            error: None,
        }
    }

    pub(crate) fn mark_saving(&mut self) {
        self.status = OperationStatus::Saving;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.status = OperationStatus::Saved;
    }

    /// Back to a fresh pending state (retry-failed control call).
    pub(crate) fn reset_for_retry(&mut self) {
        self.status = OperationStatus::Pending;
        self.retry_count = 0;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::ProjectId;
    use serde_json::json;

    #[test]
    fn id_embeds_kind_and_timestamp() {
        let at = Utc::now();
        let id = OperationId::generate(OperationKind::Character, at);
        let parts: Vec<_> = id.as_str().split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "character");
        assert_eq!(parts[1], at.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn ids_are_not_reused() {
        let at = Utc::now();
        let a = OperationId::generate(OperationKind::Document, at);
        let b = OperationId::generate(OperationKind::Document, at);
        assert_ne!(a, b);
    }

    #[test]
    fn payload_kind_follows_variant() {
        let project = Project::new("Saga").unwrap();
        let doc = inkwell_core::Document::new(project.id, "One").unwrap();

        assert_eq!(SavePayload::from(project).kind(), OperationKind::Project);
        assert_eq!(SavePayload::from(doc).kind(), OperationKind::Document);
        assert_eq!(
            SavePayload::from(Settings::new()).kind(),
            OperationKind::Settings
        );
    }

    #[test]
    fn new_record_is_pending() {
        let record = OperationRecord::new(Settings::new().into());
        assert_eq!(record.status, OperationStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert!(record.error.is_none());
        assert!(record.id.as_str().starts_with("settings_"));
    }

    #[test]
    fn shared_handles_see_each_others_edits() {
        let original = Shared::new(Character::new(ProjectId::new(), "Ilse").unwrap());
        let alias = original.clone();

        alias.update(|c| c.add_trait("curious"));

        assert!(original.ptr_eq(&alias));
        assert_eq!(original.snapshot().traits, vec!["curious".to_string()]);
    }

    #[test]
    fn record_serializes_current_payload() {
        let settings = Shared::new(Settings::new().with("theme", json!("dark")).unwrap());
        let record = OperationRecord::new(settings.clone().into());
        settings.update(|s| s.set("theme", json!("sepia"))).unwrap();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "settings");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["payload"]["type"], "settings");
        assert_eq!(value["payload"]["data"]["theme"], "sepia");
    }
}
