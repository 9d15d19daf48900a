use crate::model::{EntityKind, EntityRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// ChildOption
///
/// Caller rule that keeps (unlinks only) matching dependents.
///
/// A node matches when the type filter accepts its kind and the namespace
/// filter accepts its namespace. An empty filter accepts everything, but an
/// option with both filters empty matches nothing.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChildOption {
    pub exclude_types: BTreeSet<EntityKind>,
    pub exclude_namespaces: BTreeSet<String>,
}

impl ChildOption {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            exclude_types: BTreeSet::new(),
            exclude_namespaces: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn exclude_type(mut self, kind: EntityKind) -> Self {
        self.exclude_types.insert(kind);
        self
    }

    #[must_use]
    pub fn exclude_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.exclude_namespaces.insert(namespace.into());
        self
    }

    /// Keep every annotation kind.
    #[must_use]
    pub fn exclude_annotations(mut self) -> Self {
        self.exclude_types.extend(EntityKind::ANNOTATIONS);
        self
    }

    #[must_use]
    pub fn matches(&self, kind: EntityKind, namespace: Option<&str>) -> bool {
        if self.exclude_types.is_empty() && self.exclude_namespaces.is_empty() {
            return false;
        }

        let type_ok = self.exclude_types.is_empty() || self.exclude_types.contains(&kind);
        let ns_ok = self.exclude_namespaces.is_empty()
            || namespace.is_some_and(|ns| self.exclude_namespaces.contains(ns));

        type_ok && ns_ok
    }
}

///
/// DeleteRequest
///
/// One delete call: roots of a single kind, options, and the skip-head
/// modifier.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteRequest {
    pub kind: EntityKind,
    pub ids: Vec<i64>,
    #[serde(default)]
    pub options: Vec<ChildOption>,
    #[serde(default)]
    pub skip_head: bool,
    /// With `skip_head`, traversal passes through the head until it reaches
    /// one of these kinds. Empty means the head's direct children.
    #[serde(default)]
    pub start_from: BTreeSet<EntityKind>,
}

impl DeleteRequest {
    #[must_use]
    pub fn new(kind: EntityKind, ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            kind,
            ids: ids.into_iter().collect(),
            options: Vec::new(),
            skip_head: false,
            start_from: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn skip_head(mut self) -> Self {
        self.skip_head = true;
        self
    }

    #[must_use]
    pub fn start_from(mut self, kind: EntityKind) -> Self {
        self.start_from.insert(kind);
        self
    }

    #[must_use]
    pub fn option(mut self, option: ChildOption) -> Self {
        self.options.push(option);
        self
    }

    /// Requested roots in request order, without duplicates.
    #[must_use]
    pub fn roots(&self) -> Vec<EntityRef> {
        let mut seen = BTreeSet::new();

        self.ids
            .iter()
            .map(|id| EntityRef::new(self.kind, *id))
            .filter(|root| seen.insert(*root))
            .collect()
    }
}
