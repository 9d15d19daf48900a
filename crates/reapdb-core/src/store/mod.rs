//! Entity store adapter boundary.
//!
//! The delete engine never touches persisted rows directly; every read and
//! write flows through [`EntityStore`]. `MemoryStore` is the in-process,
//! transactional reference adapter.

mod memory;


use crate::{
    error::InternalError,
    model::{EntityRecord, EntityRef, LinkRef},
    spec::Relation,
};

pub use memory::MemoryStore;

///
/// Savepoint
///
/// Opaque handle for one nested rollback boundary inside a transaction.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Savepoint(pub(crate) usize);

///
/// EntityStore
///
/// Abstract read/write access to persisted entities and their references.
///
/// Reads are `&self` so the resolver may fan lookups out across threads.
/// Writes are single-writer and happen inside `begin`/`commit`.
///

pub trait EntityStore: Send + Sync {
    /// Load one row, or `None` when absent.
    fn get(&self, entity: EntityRef) -> Result<Option<EntityRecord>, InternalError>;

    /// Rows on the child side of `relation` for `parent`.
    fn children_of(
        &self,
        parent: EntityRef,
        relation: &Relation,
    ) -> Result<Vec<EntityRef>, InternalError>;

    /// Rows on the parent side of `relation` for `child`, store-wide.
    fn parents_of(
        &self,
        child: EntityRef,
        relation: &Relation,
    ) -> Result<Vec<EntityRef>, InternalError>;

    /// Remove one row. Fails with a constraint violation while any stored
    /// reference still points at it.
    fn delete(&mut self, entity: EntityRef) -> Result<(), InternalError>;

    /// Remove one stored reference.
    fn unlink(&mut self, link: LinkRef) -> Result<(), InternalError>;

    /// Clear every target of a reference field.
    fn null_field(&mut self, entity: EntityRef, field: &'static str) -> Result<(), InternalError>;

    fn begin(&mut self) -> Result<(), InternalError>;

    fn savepoint(&mut self) -> Result<Savepoint, InternalError>;

    /// Undo every write since `savepoint`; the savepoint is consumed.
    fn rollback_to(&mut self, savepoint: Savepoint) -> Result<(), InternalError>;

    /// Keep every write since `savepoint`; the savepoint is consumed.
    fn release(&mut self, savepoint: Savepoint) -> Result<(), InternalError>;

    fn commit(&mut self) -> Result<(), InternalError>;

    fn rollback(&mut self) -> Result<(), InternalError>;
}
