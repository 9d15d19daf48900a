use crate::model::EntityKind;
use serde::Serialize;
use std::collections::BTreeSet;

/// Namespace stamped on import companion files.
pub const NS_COMPANION_FILE: &str = "openmicroscopy.org/omero/import/companionFile";

///
/// UnshareablePolicy
///
/// Kinds and annotation namespaces that are always deleted with their
/// parent, even when a child option asks to keep them.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UnshareablePolicy {
    kinds: BTreeSet<EntityKind>,
    namespaces: BTreeSet<String>,
}

impl UnshareablePolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kinds: BTreeSet::new(),
            namespaces: BTreeSet::new(),
        }
    }

    /// Default table: `ExternalInfo` rows and import companion files.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_kind(EntityKind::ExternalInfo)
            .with_namespace(NS_COMPANION_FILE)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Extend the namespace table, e.g. from runtime configuration.
    #[must_use]
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces
            .extend(namespaces.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn claims(&self, kind: EntityKind, namespace: Option<&str>) -> bool {
        self.kinds.contains(&kind) || namespace.is_some_and(|ns| self.namespaces.contains(ns))
    }

    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> + '_ {
        self.namespaces.iter().map(String::as_str)
    }
}
