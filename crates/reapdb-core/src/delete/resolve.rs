//! Breadth-first plan resolution.
//!
//! Each wave reads the frontier in bulk, then folds the results into the
//! plan in frontier order so the outcome does not depend on worker count.

use crate::{
    config::DeleteConfig,
    delete::{
        CancelToken, DeleteError, DeleteRequest, DeleteState,
        plan::{ActionCause, DeletePlan, NodeRole, PlanEdge, PlanNode},
    },
    error::InternalError,
    model::{EntityRecord, EntityRef, LinkRef},
    spec::{DeleteSpecNode, DeleteSpecRegistry, Holder, Propagation},
    store::EntityStore,
};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use std::collections::{BTreeSet, btree_map::Entry};
use tracing::debug;

///
/// Expansion
///
/// Everything one store round learns about a single node.
///

struct Expansion {
    entity: EntityRef,
    record: EntityRecord,
    children: Vec<(DeleteSpecNode, EntityRef)>,
    referrers: Vec<LinkRef>,
    nullable: Vec<LinkRef>,
    lookups: u64,
}

///
/// Resolver
///

pub(crate) struct Resolver<'a> {
    registry: &'a DeleteSpecRegistry,
    store: &'a dyn EntityStore,
    config: &'a DeleteConfig,
    cancel: &'a CancelToken,
}

impl<'a> Resolver<'a> {
    pub(crate) const fn new(
        registry: &'a DeleteSpecRegistry,
        store: &'a dyn EntityStore,
        config: &'a DeleteConfig,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            registry,
            store,
            config,
            cancel,
        }
    }

    /// Build and settle the closed plan for `request`.
    pub(crate) fn resolve(&self, request: &DeleteRequest) -> Result<DeletePlan, DeleteError> {
        let mut plan = DeletePlan::default();
        let mut frontier = Vec::new();

        for root in request.roots() {
            plan.lookups += 1;
            if self.store.get(root)?.is_some() {
                plan.roots.push(root);
                plan.nodes
                    .insert(root, PlanNode::root(root, request.skip_head));
                frontier.push(root);
            } else {
                debug!(%root, "delete root not found");
                plan.missing.push(root);
            }
        }

        let pool = self.worker_pool()?;
        let mut wave = 0usize;
        while !frontier.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(DeleteError::Cancelled {
                    phase: DeleteState::Resolving,
                });
            }

            let expansions = self.expand_wave(pool.as_ref(), &frontier)?;
            frontier = Self::merge_wave(&mut plan, request, expansions);

            if let Some(limit) = self.config.max_plan_nodes
                && plan.nodes.len() > limit
            {
                return Err(DeleteError::PlanTooLarge {
                    nodes: plan.nodes.len(),
                    limit,
                });
            }

            wave += 1;
            debug!(wave, nodes = plan.nodes.len(), next = frontier.len(), "resolved wave");
        }

        plan.settle(&BTreeSet::new(), true, ActionCause::Shared);

        Ok(plan)
    }

    // One pool per request; `None` reads the frontier on the calling thread.
    fn worker_pool(&self) -> Result<Option<ThreadPool>, InternalError> {
        let workers = self.config.resolve_workers;
        if workers <= 1 {
            return Ok(None);
        }

        ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("reapdb-resolve-{index}"))
            .build()
            .map(Some)
            .map_err(|err| InternalError::resolver_invariant(format!("resolver pool: {err}")))
    }

    fn expand_wave(
        &self,
        pool: Option<&ThreadPool>,
        frontier: &[EntityRef],
    ) -> Result<Vec<Expansion>, InternalError> {
        match pool {
            Some(pool) if frontier.len() > 1 => pool.install(|| {
                frontier
                    .par_iter()
                    .map(|entity| self.expand(*entity))
                    .collect()
            }),
            _ => frontier.iter().map(|entity| self.expand(*entity)).collect(),
        }
    }

    fn expand(&self, entity: EntityRef) -> Result<Expansion, InternalError> {
        let mut lookups = 1;
        let record = self.store.get(entity)?.ok_or_else(|| {
            InternalError::resolver_invariant(format!("{entity} vanished during resolution"))
        })?;

        let mut children = Vec::new();
        for spec in self.registry.spec_for(entity.kind) {
            if !follows(spec, &record) {
                continue;
            }
            lookups += 1;
            for child in self.store.children_of(entity, &spec.relation)? {
                children.push((*spec, child));
            }
        }

        let mut referrers = Vec::new();
        for relation in self.registry.references_to(entity.kind) {
            lookups += 1;
            let holders = match relation.holder {
                Holder::Parent => self.store.parents_of(entity, relation)?,
                Holder::Child => self.store.children_of(entity, relation)?,
            };
            referrers.extend(
                holders
                    .into_iter()
                    .map(|holder| LinkRef::new(holder, relation.field, entity)),
            );
        }

        let mut nullable = Vec::new();
        for reference in self.registry.nullable_to(entity.kind) {
            lookups += 1;
            nullable.extend(
                self.store
                    .parents_of(entity, &reference.as_relation())?
                    .into_iter()
                    .map(|holder| LinkRef::new(holder, reference.field, entity)),
            );
        }

        Ok(Expansion {
            entity,
            record,
            children,
            referrers,
            nullable,
            lookups,
        })
    }

    // Fold one wave into the plan; returns the next frontier.
    fn merge_wave(
        plan: &mut DeletePlan,
        request: &DeleteRequest,
        expansions: Vec<Expansion>,
    ) -> Vec<EntityRef> {
        let mut next = Vec::new();
        let mut queued = BTreeSet::new();

        for expansion in expansions {
            plan.lookups += expansion.lookups;
            let parent = expansion.entity;
            let Some(node) = plan.nodes.get_mut(&parent) else {
                continue;
            };
            node.absorb(expansion.record);
            node.referrers = expansion.referrers;
            node.nullable_referrers = expansion.nullable;

            let depth = node.depth + 1;
            let as_head = node.is_head();
            let deleted = node.is_deleted();
            let referrers = node.referrers.clone();

            for (spec, child) in expansion.children {
                // a kept head never orphans the collection it belongs to
                if as_head && spec.propagation == Propagation::Orphan {
                    continue;
                }

                let role = if as_head
                    && !request.start_from.is_empty()
                    && !request.start_from.contains(&child.kind)
                {
                    NodeRole::Head
                } else {
                    NodeRole::Dependent
                };
                let edge = PlanEdge::Spec { parent, spec };

                match plan.nodes.entry(child) {
                    Entry::Vacant(slot) => {
                        slot.insert(PlanNode::reached(child, role, depth, edge));
                        if queued.insert(child) {
                            next.push(child);
                        }
                    }
                    Entry::Occupied(mut slot) => {
                        let existing = slot.get_mut();
                        existing.incoming.push(edge);

                        // an endpoint reached through the registry gets expanded after all
                        if existing.role == NodeRole::Endpoint {
                            *existing = PlanNode::reached(child, role, depth, edge);
                            if queued.insert(child) {
                                next.push(child);
                            }
                        }
                    }
                }
            }

            if !deleted {
                continue;
            }
            for link in referrers {
                if !link.source.kind.is_link() {
                    continue;
                }
                let edge = PlanEdge::Endpoint {
                    target: parent,
                    field: link.field,
                };

                match plan.nodes.entry(link.source) {
                    Entry::Vacant(slot) => {
                        slot.insert(PlanNode::reached(link.source, NodeRole::Endpoint, depth, edge));
                    }
                    Entry::Occupied(mut slot) => {
                        let existing = slot.get_mut();
                        if existing.role == NodeRole::Endpoint && !existing.incoming.contains(&edge) {
                            existing.incoming.push(edge);
                        }
                    }
                }
            }
        }

        next
    }
}

// Annotation-on-annotation links are removed with either end, but the
// annotation they point at never goes with them.
fn follows(spec: &DeleteSpecNode, record: &EntityRecord) -> bool {
    let relation = spec.relation;
    if !(relation.parent.is_link() && relation.child.is_annotation()) {
        return true;
    }

    !record
        .targets("parent")
        .any(|parent| parent.kind.is_annotation())
}
