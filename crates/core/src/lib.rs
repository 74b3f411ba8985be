//! `inkwell-core` — domain building blocks shared by the writing app.
//!
//! This crate contains **pure domain** types (no IO, no async). The save
//! queue persists these entities; it never interprets them.

pub mod character;
pub mod document;
pub mod entity;
pub mod error;
pub mod id;
pub mod project;
pub mod settings;

pub use character::Character;
pub use document::Document;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CharacterId, DocumentId, ProjectId};
pub use project::Project;
pub use settings::Settings;
