use crate::{
    model::{EntityRecord, EntityRef, LinkRef},
    spec::{DeleteSpecNode, Holder, Propagation},
};
use derive_more::Display;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

///
/// PlanAction
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
pub enum PlanAction {
    Delete,
    Keep,
    Unlink,
}

///
/// NodeRole
///
/// Why a node is part of the plan at all.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
pub enum NodeRole {
    /// Reached through a registry edge.
    Dependent,
    /// Link row outside the traversal that points at a deleted row.
    Endpoint,
    /// Skip-head pass-through node; traversed, never deleted.
    Head,
    /// Requested by the caller.
    Root,
}

///
/// ActionCause
///
/// Reason a node ended up with something other than its initial action.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
pub enum ActionCause {
    Denied,
    Head,
    Option,
    /// Shared once an earlier root failed and its rows stayed behind.
    Resettled,
    Shared,
}

///
/// PlanEdge
///
/// Incoming edge of a plan node.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PlanEdge {
    Spec {
        parent: EntityRef,
        spec: DeleteSpecNode,
    },
    Endpoint {
        target: EntityRef,
        field: &'static str,
    },
}

impl PlanEdge {
    pub(crate) const fn source(&self) -> EntityRef {
        match self {
            Self::Spec { parent, .. } => *parent,
            Self::Endpoint { target, .. } => *target,
        }
    }
}

///
/// PlanNode
///

#[derive(Clone, Debug)]
pub struct PlanNode {
    pub entity: EntityRef,
    pub reachable_from: BTreeSet<EntityRef>,
    pub shared_outside_set: bool,
    pub authorized: bool,
    pub action: PlanAction,

    pub(crate) role: NodeRole,
    pub(crate) cause: Option<ActionCause>,
    pub(crate) depth: usize,
    pub(crate) incoming: Vec<PlanEdge>,
    pub(crate) namespace: Option<String>,
    pub(crate) outgoing: BTreeMap<&'static str, BTreeSet<EntityRef>>,
    pub(crate) referrers: Vec<LinkRef>,
    pub(crate) nullable_referrers: Vec<LinkRef>,
    pub(crate) live: bool,
}

impl PlanNode {
    fn new(entity: EntityRef, role: NodeRole, depth: usize) -> Self {
        let (action, cause) = match role {
            NodeRole::Head => (PlanAction::Keep, Some(ActionCause::Head)),
            _ => (PlanAction::Delete, None),
        };

        Self {
            entity,
            reachable_from: BTreeSet::new(),
            shared_outside_set: false,
            authorized: false,
            action,
            role,
            cause,
            depth,
            incoming: Vec::new(),
            namespace: None,
            outgoing: BTreeMap::new(),
            referrers: Vec::new(),
            nullable_referrers: Vec::new(),
            live: true,
        }
    }

    pub(crate) fn root(entity: EntityRef, skip_head: bool) -> Self {
        let mut node = Self::new(entity, NodeRole::Root, 0);
        if skip_head {
            node.action = PlanAction::Keep;
            node.cause = Some(ActionCause::Head);
        }

        node
    }

    pub(crate) fn reached(entity: EntityRef, role: NodeRole, depth: usize, edge: PlanEdge) -> Self {
        let mut node = Self::new(entity, role, depth);
        node.incoming.push(edge);

        node
    }

    pub(crate) fn absorb(&mut self, record: EntityRecord) {
        self.namespace = record.namespace;
        self.outgoing = record.fields;
    }

    #[must_use]
    pub const fn role(&self) -> NodeRole {
        self.role
    }

    #[must_use]
    pub const fn cause(&self) -> Option<ActionCause> {
        self.cause
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Still part of the plan after the last settle.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.live
    }

    /// Traversed but kept because of skip-head.
    #[must_use]
    pub const fn is_head(&self) -> bool {
        matches!(self.action, PlanAction::Keep) && matches!(self.cause, Some(ActionCause::Head))
    }

    /// Whether edges out of this node carry liveness to its children.
    #[must_use]
    pub const fn propagates(&self) -> bool {
        matches!(self.action, PlanAction::Delete) || self.is_head()
    }

    pub(crate) const fn is_deleted(&self) -> bool {
        matches!(self.action, PlanAction::Delete)
    }

    /// Relation through which the node was first reached, if any.
    pub(crate) fn via(&self) -> Option<String> {
        self.incoming.iter().find_map(|edge| match edge {
            PlanEdge::Spec { spec, .. } => Some(spec.relation.to_string()),
            PlanEdge::Endpoint { target, field } => Some(format!(
                "{}.{field} -> {target}",
                self.entity.kind
            )),
        })
    }
}

///
/// DeletePlan
///
/// Closed set of rows touched by one request, keyed by entity.
///

#[derive(Clone, Debug, Default)]
pub struct DeletePlan {
    pub(crate) roots: Vec<EntityRef>,
    pub(crate) missing: Vec<EntityRef>,
    pub(crate) nodes: BTreeMap<EntityRef, PlanNode>,
    pub(crate) lookups: u64,
}

impl DeletePlan {
    /// Roots that exist, in request order.
    #[must_use]
    pub fn roots(&self) -> &[EntityRef] {
        &self.roots
    }

    /// Requested roots that were not found.
    #[must_use]
    pub fn missing(&self) -> &[EntityRef] {
        &self.missing
    }

    #[must_use]
    pub fn node(&self, entity: EntityRef) -> Option<&PlanNode> {
        self.nodes.get(&entity)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PlanNode> + '_ {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Store reads issued while resolving.
    #[must_use]
    pub const fn lookups(&self) -> u64 {
        self.lookups
    }

    pub(crate) fn root_index(&self, entity: EntityRef) -> Option<usize> {
        self.roots.iter().position(|root| *root == entity)
    }

    /// Recompute liveness and sharing until nothing changes.
    ///
    /// Rows in `excluded` are treated as outside the set. `cause` tags any
    /// node downgraded to Unlink by this pass. With `prune`, nodes that are
    /// no longer live are dropped from the plan; denied nodes stay so they
    /// are still reported.
    pub(crate) fn settle(&mut self, excluded: &BTreeSet<EntityRef>, prune: bool, cause: ActionCause) {
        let adjacency = self.adjacency();

        let live = loop {
            let (dead, live) = self.settle_heads(&adjacency, excluded);
            if self.promote_link_heads(&adjacency, &live) {
                continue;
            }

            let detached = self.detached_links(&live);
            let shared: Vec<EntityRef> = self
                .nodes
                .values()
                .filter(|node| {
                    node.role == NodeRole::Dependent
                        && node.is_deleted()
                        && !node.entity.kind.is_link()
                        && live.contains(&node.entity)
                })
                .filter(|node| {
                    self.is_shared(node, &live, &detached, &adjacency, excluded, &dead)
                })
                .map(|node| node.entity)
                .collect();

            if shared.is_empty() {
                break live;
            }

            for entity in shared {
                if let Some(node) = self.nodes.get_mut(&entity) {
                    node.action = PlanAction::Unlink;
                    node.cause = Some(cause);
                    node.shared_outside_set = true;
                }
            }
        };

        for node in self.nodes.values_mut() {
            node.live = live.contains(&node.entity);
        }
        if prune {
            self.nodes
                .retain(|_, node| node.live || node.cause == Some(ActionCause::Denied));
        }

        self.compute_reachable(&adjacency, &live);
    }

    /// Stored references that must be removed before their target row is
    /// deleted, because the holder row stays behind.
    pub(crate) fn detached_links(&self, live: &BTreeSet<EntityRef>) -> BTreeSet<LinkRef> {
        let mut detached = BTreeSet::new();

        for node in self.nodes.values() {
            if !live.contains(&node.entity) {
                continue;
            }

            for edge in &node.incoming {
                let PlanEdge::Spec { parent, spec } = edge else {
                    continue;
                };
                let Some(parent_node) = self.nodes.get(parent) else {
                    continue;
                };
                if !live.contains(parent) {
                    continue;
                }

                let field = spec.relation.field;
                match (node.action, spec.relation.holder) {
                    (PlanAction::Unlink, Holder::Child) if parent_node.is_deleted() => {
                        detached.insert(LinkRef::new(node.entity, field, *parent));
                    }
                    (PlanAction::Delete, Holder::Parent) if parent_node.is_head() => {
                        detached.insert(LinkRef::new(*parent, field, node.entity));
                    }
                    _ => {}
                }
            }
        }

        detached
    }

    pub(crate) fn live_entities(&self) -> BTreeSet<EntityRef> {
        self.nodes
            .values()
            .filter(|node| node.live)
            .map(|node| node.entity)
            .collect()
    }

    // parent (or endpoint target) -> nodes with an incoming edge from it
    fn adjacency(&self) -> BTreeMap<EntityRef, Vec<EntityRef>> {
        let mut adjacency: BTreeMap<EntityRef, Vec<EntityRef>> = BTreeMap::new();
        for node in self.nodes.values() {
            for edge in &node.incoming {
                adjacency.entry(edge.source()).or_default().push(node.entity);
            }
        }
        for children in adjacency.values_mut() {
            children.sort_unstable();
            children.dedup();
        }

        adjacency
    }

    fn edge_carries(&self, edge: &PlanEdge, live: &BTreeSet<EntityRef>) -> bool {
        match edge {
            PlanEdge::Spec { parent, .. } => {
                live.contains(parent) && self.nodes.get(parent).is_some_and(PlanNode::propagates)
            }
            PlanEdge::Endpoint { target, .. } => {
                live.contains(target) && self.nodes.get(target).is_some_and(PlanNode::is_deleted)
            }
        }
    }

    fn live_set(
        &self,
        adjacency: &BTreeMap<EntityRef, Vec<EntityRef>>,
        blocked: &BTreeSet<EntityRef>,
    ) -> BTreeSet<EntityRef> {
        let mut live = BTreeSet::new();
        let mut queue = VecDeque::new();

        for root in &self.roots {
            if self.nodes.contains_key(root) && !blocked.contains(root) && live.insert(*root) {
                queue.push_back(*root);
            }
        }

        while let Some(entity) = queue.pop_front() {
            let Some(children) = adjacency.get(&entity) else {
                continue;
            };
            for child in children {
                if live.contains(child) || blocked.contains(child) {
                    continue;
                }
                let Some(node) = self.nodes.get(child) else {
                    continue;
                };
                if node.incoming.iter().any(|edge| self.edge_carries(edge, &live)) {
                    live.insert(*child);
                    queue.push_back(*child);
                }
            }
        }

        live
    }

    // Drop pass-through heads that lead to no work; returns (dead, live).
    fn settle_heads(
        &self,
        adjacency: &BTreeMap<EntityRef, Vec<EntityRef>>,
        excluded: &BTreeSet<EntityRef>,
    ) -> (BTreeSet<EntityRef>, BTreeSet<EntityRef>) {
        let mut dead = BTreeSet::new();

        loop {
            let blocked: BTreeSet<EntityRef> = excluded.union(&dead).copied().collect();
            let live = self.live_set(adjacency, &blocked);

            let idle: Vec<EntityRef> = live
                .iter()
                .filter(|entity| {
                    self.nodes
                        .get(entity)
                        .is_some_and(|node| node.role == NodeRole::Head)
                })
                .filter(|entity| !self.has_live_work(**entity, adjacency, &live))
                .copied()
                .collect();

            if idle.is_empty() {
                return (dead, live);
            }
            dead.extend(idle);
        }
    }

    fn has_live_work(
        &self,
        head: EntityRef,
        adjacency: &BTreeMap<EntityRef, Vec<EntityRef>>,
        live: &BTreeSet<EntityRef>,
    ) -> bool {
        adjacency.get(&head).into_iter().flatten().any(|child| {
            live.contains(child)
                && self
                    .nodes
                    .get(child)
                    .is_some_and(|node| node.is_deleted() || node.role == NodeRole::Head)
        })
    }

    // A kept link row would dangle once its deleted child is gone.
    fn promote_link_heads(
        &mut self,
        adjacency: &BTreeMap<EntityRef, Vec<EntityRef>>,
        live: &BTreeSet<EntityRef>,
    ) -> bool {
        let promote: Vec<EntityRef> = live
            .iter()
            .filter(|entity| entity.kind.is_link())
            .filter(|entity| {
                self.nodes
                    .get(entity)
                    .is_some_and(|node| node.role == NodeRole::Head)
            })
            .filter(|entity| {
                adjacency.get(entity).into_iter().flatten().any(|child| {
                    live.contains(child) && self.nodes.get(child).is_some_and(PlanNode::is_deleted)
                })
            })
            .copied()
            .collect();

        for entity in &promote {
            if let Some(node) = self.nodes.get_mut(entity) {
                node.role = NodeRole::Dependent;
                node.action = PlanAction::Delete;
                node.cause = None;
            }
        }

        !promote.is_empty()
    }

    fn is_shared(
        &self,
        node: &PlanNode,
        live: &BTreeSet<EntityRef>,
        detached: &BTreeSet<LinkRef>,
        adjacency: &BTreeMap<EntityRef, Vec<EntityRef>>,
        excluded: &BTreeSet<EntityRef>,
        dead: &BTreeSet<EntityRef>,
    ) -> bool {
        let deleted_in = |scope: &BTreeSet<EntityRef>, entity: &EntityRef| {
            scope.contains(entity)
                && self
                    .nodes
                    .get(entity)
                    .is_some_and(|n| n.is_deleted() && n.role != NodeRole::Endpoint)
        };
        let closed_in = |scope: &BTreeSet<EntityRef>, entity: &EntityRef| {
            deleted_in(scope, entity)
                || (scope.contains(entity) && self.nodes.get(entity).is_some_and(PlanNode::is_head))
        };

        // same-relation parents
        let mut held_by = BTreeSet::new();
        for edge in &node.incoming {
            let PlanEdge::Spec { spec, .. } = edge else {
                continue;
            };
            if !self.edge_carries(edge, live) {
                continue;
            }

            let relation = spec.relation;
            // An orphaned collection must not count itself as a reason to keep its members.
            let without_self;
            let scope: &BTreeSet<EntityRef> = if spec.propagation == Propagation::Orphan {
                let mut blocked: BTreeSet<EntityRef> = excluded.union(dead).copied().collect();
                blocked.insert(node.entity);
                without_self = self.live_set(adjacency, &blocked);
                &without_self
            } else {
                live
            };

            let outside = match relation.holder {
                Holder::Child => node
                    .outgoing
                    .get(relation.field)
                    .into_iter()
                    .flatten()
                    .any(|target| !closed_in(scope, target)),
                Holder::Parent => {
                    held_by.insert((relation.parent, relation.field));
                    node.referrers
                        .iter()
                        .filter(|x| x.source.kind == relation.parent && x.field == relation.field)
                        .any(|x| !(deleted_in(scope, &x.source) || detached.contains(x)))
                }
            };
            if outside {
                return true;
            }
        }

        // blocking referrers through other relations
        node.referrers
            .iter()
            .filter(|x| x.source != node.entity)
            .filter(|x| !held_by.contains(&(x.source.kind, x.field)))
            .any(|x| {
                let deleted = live.contains(&x.source)
                    && self.nodes.get(&x.source).is_some_and(PlanNode::is_deleted);

                if x.source.kind.is_link() {
                    !deleted
                } else {
                    !(deleted || detached.contains(x))
                }
            })
    }

    fn compute_reachable(
        &mut self,
        adjacency: &BTreeMap<EntityRef, Vec<EntityRef>>,
        live: &BTreeSet<EntityRef>,
    ) {
        let mut reach: BTreeMap<EntityRef, BTreeSet<EntityRef>> = BTreeMap::new();
        let mut queue = VecDeque::new();

        for root in &self.roots {
            if live.contains(root) {
                reach.entry(*root).or_default().insert(*root);
                queue.push_back(*root);
            }
        }

        while let Some(entity) = queue.pop_front() {
            let from = reach.get(&entity).cloned().unwrap_or_default();

            for child in adjacency.get(&entity).into_iter().flatten() {
                if !live.contains(child) {
                    continue;
                }
                let Some(node) = self.nodes.get(child) else {
                    continue;
                };
                let carried = node
                    .incoming
                    .iter()
                    .any(|edge| edge.source() == entity && self.edge_carries(edge, live));
                if !carried {
                    continue;
                }

                let set = reach.entry(*child).or_default();
                let before = set.len();
                set.extend(from.iter().copied());
                if set.len() != before {
                    queue.push_back(*child);
                }
            }
        }

        for node in self.nodes.values_mut() {
            node.reachable_from = reach.remove(&node.entity).unwrap_or_default();
        }
    }
}
