use crate::model::EntityKind;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

///
/// EntityRef
///
/// Immutable `(kind, id)` handle used throughout the engine.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    #[must_use]
    pub const fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

///
/// LinkRef
///
/// One stored reference: `source.field` points at `target`.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LinkRef {
    pub source: EntityRef,
    pub field: &'static str,
    pub target: EntityRef,
}

impl LinkRef {
    #[must_use]
    pub const fn new(source: EntityRef, field: &'static str, target: EntityRef) -> Self {
        Self {
            source,
            field,
            target,
        }
    }
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.source, self.field, self.target)
    }
}

///
/// Ownership
///
/// Owner and group details persisted with every ownable row.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Ownership {
    pub owner_id: i64,
    pub group_id: i64,
}

impl Ownership {
    #[must_use]
    pub const fn new(owner_id: i64, group_id: i64) -> Self {
        Self { owner_id, group_id }
    }
}

///
/// EntityRecord
///
/// Persisted view of one row: identity, ownership, optional annotation
/// namespace, and the reference fields stored on this row.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityRecord {
    pub entity: EntityRef,
    pub details: Ownership,
    pub namespace: Option<String>,
    pub fields: BTreeMap<&'static str, BTreeSet<EntityRef>>,
}

impl EntityRecord {
    #[must_use]
    pub const fn new(entity: EntityRef, details: Ownership) -> Self {
        Self {
            entity,
            details,
            namespace: None,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add one target to a reference field.
    #[must_use]
    pub fn with_ref(mut self, field: &'static str, target: EntityRef) -> Self {
        self.fields.entry(field).or_default().insert(target);
        self
    }

    /// Targets currently stored in `field` (empty when unset).
    pub fn targets(&self, field: &str) -> impl Iterator<Item = EntityRef> + '_ {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|targets| targets.iter().copied())
    }

    /// Every stored reference on this row.
    pub fn links(&self) -> impl Iterator<Item = LinkRef> + '_ {
        self.fields.iter().flat_map(move |(field, targets)| {
            targets
                .iter()
                .map(move |target| LinkRef::new(self.entity, *field, *target))
        })
    }
}
