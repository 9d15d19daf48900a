use crate::model::{EntityKind, EntityRef, LinkRef};
use serde::Serialize;
use std::fmt;

///
/// Holder
///
/// Which side of a relation physically stores the reference field.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Holder {
    /// `parent.field` points at the child (e.g. `DatasetImageLink.child`).
    Parent,
    /// `child.field` points at the parent (e.g. `Pixels.image`).
    Child,
}

///
/// Relation
///
/// One traversable view of a stored reference field.
/// Several relations may view the same field from opposite directions.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Relation {
    pub parent: EntityKind,
    pub name: &'static str,
    pub child: EntityKind,
    pub field: &'static str,
    pub holder: Holder,
}

impl Relation {
    #[must_use]
    pub const fn new(
        parent: EntityKind,
        name: &'static str,
        child: EntityKind,
        field: &'static str,
        holder: Holder,
    ) -> Self {
        Self {
            parent,
            name,
            child,
            field,
            holder,
        }
    }

    /// Kind of the row that stores the field.
    #[must_use]
    pub const fn holder_kind(&self) -> EntityKind {
        match self.holder {
            Holder::Parent => self.parent,
            Holder::Child => self.child,
        }
    }

    /// Kind of the row the stored field points at.
    #[must_use]
    pub const fn target_kind(&self) -> EntityKind {
        match self.holder {
            Holder::Parent => self.child,
            Holder::Child => self.parent,
        }
    }

    /// Stored reference backing the edge `parent -> child` of this relation.
    #[must_use]
    pub const fn link_between(&self, parent: EntityRef, child: EntityRef) -> LinkRef {
        match self.holder {
            Holder::Parent => LinkRef::new(parent, self.field, child),
            Holder::Child => LinkRef::new(child, self.field, parent),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.parent, self.name, self.child)
    }
}

///
/// Propagation
///
/// How deleting a parent propagates across one registry edge.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Propagation {
    /// Child is a pure link row; it is removed with either endpoint.
    Link,
    /// Child is deleted with the parent unless shared.
    Cascade,
    /// Child is collected once every row referencing it is deleted.
    /// Excluded from cascade-cycle validation.
    Orphan,
}

///
/// DeleteSpecNode
///
/// Named traversal step `{parent, relation, child, cascades}` in the
/// delete graph registry.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct DeleteSpecNode {
    pub relation: Relation,
    pub propagation: Propagation,
}

impl DeleteSpecNode {
    #[must_use]
    pub const fn parent(&self) -> EntityKind {
        self.relation.parent
    }

    #[must_use]
    pub const fn child(&self) -> EntityKind {
        self.relation.child
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.relation.name
    }

    /// `false` only for pure link edges.
    #[must_use]
    pub const fn cascades(&self) -> bool {
        !matches!(self.propagation, Propagation::Link)
    }
}

///
/// NullableRef
///
/// Provenance-style reference (`Pixels.relatedTo`) that is nulled when its
/// target is deleted. Never blocks and never cascades.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NullableRef {
    pub holder: EntityKind,
    pub field: &'static str,
    pub target: EntityKind,
}

impl NullableRef {
    #[must_use]
    pub const fn new(holder: EntityKind, field: &'static str, target: EntityKind) -> Self {
        Self {
            holder,
            field,
            target,
        }
    }

    /// Parent-held relation view used to look up holders in the store.
    #[must_use]
    pub const fn as_relation(&self) -> Relation {
        Relation {
            parent: self.holder,
            name: self.field,
            child: self.target,
            field: self.field,
            holder: Holder::Parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXELS_OF_IMAGE: Relation = Relation {
        parent: EntityKind::Image,
        name: "pixels",
        child: EntityKind::Pixels,
        field: "image",
        holder: Holder::Child,
    };

    #[test]
    fn child_held_relation_stores_reference_on_child() {
        let image = EntityRef::new(EntityKind::Image, 1);
        let pixels = EntityRef::new(EntityKind::Pixels, 2);
        let link = PIXELS_OF_IMAGE.link_between(image, pixels);

        assert_eq!(PIXELS_OF_IMAGE.holder_kind(), EntityKind::Pixels);
        assert_eq!(PIXELS_OF_IMAGE.target_kind(), EntityKind::Image);
        assert_eq!(link, LinkRef::new(pixels, "image", image));
    }

    #[test]
    fn link_edges_do_not_cascade() {
        let node = DeleteSpecNode {
            relation: PIXELS_OF_IMAGE,
            propagation: Propagation::Link,
        };
        assert!(!node.cascades());

        let node = DeleteSpecNode {
            relation: PIXELS_OF_IMAGE,
            propagation: Propagation::Orphan,
        };
        assert!(node.cascades());
    }
}
