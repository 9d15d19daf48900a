use crate::{
    model::EntityKind,
    spec::{DeleteSpecNode, Holder, NullableRef, Propagation, Relation, UnshareablePolicy},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
};
use thiserror::Error as ThisError;

///
/// RegistryError
///
/// Configuration errors raised when the delete graph is loaded.
/// Never raised at request time.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("cascade cycle: {}", display_path(.path))]
    CascadeCycle { path: Vec<EntityKind> },

    #[error("duplicate edge {parent}.{name}")]
    DuplicateEdge {
        parent: EntityKind,
        name: &'static str,
    },

    #[error("link edge {parent}.{name} points at {child}, which is not a link kind")]
    LinkTargetNotLink {
        parent: EntityKind,
        name: &'static str,
        child: EntityKind,
    },

    #[error("orphan edge {parent}.{name} must be held by its parent")]
    OrphanHolder {
        parent: EntityKind,
        name: &'static str,
    },
}

fn display_path(path: &[EntityKind]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

///
/// RegistryBuilder
///
/// Declares delete graph edges; `build` validates the whole table.
///

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    nodes: Vec<DeleteSpecNode>,
    nullable: Vec<NullableRef>,
    policy: UnshareablePolicy,
}

impl RegistryBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            nullable: Vec::new(),
            policy: UnshareablePolicy::new(),
        }
    }

    #[must_use]
    pub fn edge(mut self, relation: Relation, propagation: Propagation) -> Self {
        self.nodes.push(DeleteSpecNode {
            relation,
            propagation,
        });
        self
    }

    #[must_use]
    pub fn cascade(self, relation: Relation) -> Self {
        self.edge(relation, Propagation::Cascade)
    }

    #[must_use]
    pub fn link(self, relation: Relation) -> Self {
        self.edge(relation, Propagation::Link)
    }

    #[must_use]
    pub fn orphan(self, relation: Relation) -> Self {
        self.edge(relation, Propagation::Orphan)
    }

    #[must_use]
    pub fn nullable(mut self, nullable: NullableRef) -> Self {
        self.nullable.push(nullable);
        self
    }

    #[must_use]
    pub fn unshareable_kind(mut self, kind: EntityKind) -> Self {
        self.policy = self.policy.with_kind(kind);
        self
    }

    #[must_use]
    pub fn unshareable_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.policy = self.policy.with_namespace(namespace);
        self
    }

    /// Validate every declared edge and freeze the registry.
    pub fn build(self) -> Result<DeleteSpecRegistry, RegistryError> {
        validate_edges(&self.nodes)?;
        validate_cascade_acyclic(&self.nodes)?;

        // Group nodes by parent kind; declaration order is kept within a parent.
        let mut nodes = self.nodes;
        nodes.sort_by_key(DeleteSpecNode::parent);

        let mut by_parent: BTreeMap<EntityKind, Range<usize>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            by_parent
                .entry(node.parent())
                .and_modify(|range| range.end = i + 1)
                .or_insert(i..i + 1);
        }

        // One canonical relation per stored field, indexed by its target kind.
        let mut seen = BTreeSet::new();
        let mut by_target: BTreeMap<EntityKind, Vec<Relation>> = BTreeMap::new();
        for node in &nodes {
            let relation = node.relation;
            if seen.insert((relation.holder_kind(), relation.field, relation.target_kind())) {
                by_target
                    .entry(relation.target_kind())
                    .or_default()
                    .push(relation);
            }
        }

        let mut nullable: BTreeMap<EntityKind, Vec<NullableRef>> = BTreeMap::new();
        for reference in self.nullable {
            nullable.entry(reference.target).or_default().push(reference);
        }

        Ok(DeleteSpecRegistry {
            nodes,
            by_parent,
            by_target,
            nullable,
            policy: self.policy,
        })
    }
}

// Per-edge shape checks.
fn validate_edges(nodes: &[DeleteSpecNode]) -> Result<(), RegistryError> {
    let mut names = BTreeSet::new();

    for node in nodes {
        let relation = node.relation;
        if !names.insert((relation.parent, relation.name)) {
            return Err(RegistryError::DuplicateEdge {
                parent: relation.parent,
                name: relation.name,
            });
        }

        match node.propagation {
            Propagation::Link if !relation.child.capabilities().link => {
                return Err(RegistryError::LinkTargetNotLink {
                    parent: relation.parent,
                    name: relation.name,
                    child: relation.child,
                });
            }
            Propagation::Orphan if relation.holder != Holder::Parent => {
                return Err(RegistryError::OrphanHolder {
                    parent: relation.parent,
                    name: relation.name,
                });
            }
            _ => {}
        }
    }

    Ok(())
}

// Reject any cycle built purely from cascading edges.
// Link edges break a chain; orphan edges walk upwards and are ignored.
fn validate_cascade_acyclic(nodes: &[DeleteSpecNode]) -> Result<(), RegistryError> {
    let mut graph: BTreeMap<EntityKind, BTreeSet<EntityKind>> = BTreeMap::new();
    for node in nodes {
        if node.propagation == Propagation::Cascade {
            graph.entry(node.parent()).or_default().insert(node.child());
        }
    }

    let mut done = BTreeSet::new();
    for &start in graph.keys() {
        let mut stack = Vec::new();
        visit_kind(&graph, start, &mut stack, &mut done)?;
    }

    Ok(())
}

fn visit_kind(
    graph: &BTreeMap<EntityKind, BTreeSet<EntityKind>>,
    kind: EntityKind,
    stack: &mut Vec<EntityKind>,
    done: &mut BTreeSet<EntityKind>,
) -> Result<(), RegistryError> {
    if done.contains(&kind) {
        return Ok(());
    }
    if let Some(pos) = stack.iter().position(|k| *k == kind) {
        let mut path = stack[pos..].to_vec();
        path.push(kind);

        return Err(RegistryError::CascadeCycle { path });
    }

    stack.push(kind);
    if let Some(children) = graph.get(&kind) {
        for &child in children {
            visit_kind(graph, child, stack, done)?;
        }
    }
    stack.pop();
    done.insert(kind);

    Ok(())
}

///
/// DeleteSpecRegistry
///
/// Validated, immutable arena of delete graph nodes.
///

#[derive(Clone, Debug)]
pub struct DeleteSpecRegistry {
    nodes: Vec<DeleteSpecNode>,
    by_parent: BTreeMap<EntityKind, Range<usize>>,
    by_target: BTreeMap<EntityKind, Vec<Relation>>,
    nullable: BTreeMap<EntityKind, Vec<NullableRef>>,
    policy: UnshareablePolicy,
}

impl DeleteSpecRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Outgoing traversal steps for `kind`, in declaration order.
    #[must_use]
    pub fn spec_for(&self, kind: EntityKind) -> &[DeleteSpecNode] {
        self.by_parent
            .get(&kind)
            .map(|range| &self.nodes[range.clone()])
            .unwrap_or_default()
    }

    /// Every registered stored field that points at rows of `kind`.
    #[must_use]
    pub fn references_to(&self, kind: EntityKind) -> &[Relation] {
        self.by_target
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Nullable references that point at rows of `kind`.
    #[must_use]
    pub fn nullable_to(&self, kind: EntityKind) -> &[NullableRef] {
        self.nullable
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn policy(&self) -> &UnshareablePolicy {
        &self.policy
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DeleteSpecNode> + '_ {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
