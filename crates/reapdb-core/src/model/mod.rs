//! Entity identity, ownership, and persisted record shapes.

mod entity;
mod kind;

pub use entity::{EntityRecord, EntityRef, LinkRef, Ownership};
pub use kind::{EntityKind, KindCapabilities};
