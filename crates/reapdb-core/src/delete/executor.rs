//! Per-root segmented execution.
//!
//! One store transaction per request and one savepoint per root. A failed
//! segment rolls back alone; later segments are settled again with the
//! failed rows treated as outside the set before they run.

use crate::{
    config::{DeleteConfig, DeleteMode},
    delete::{
        CancelToken, DeleteError, DeleteState, NodeOutcome, RootFailure, RootStatus,
        plan::{ActionCause, DeletePlan, NodeRole},
    },
    error::InternalError,
    model::{EntityRef, LinkRef},
    obs::sink::{self, MetricsEvent},
    store::EntityStore,
};
use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
};
use tracing::{debug, warn};

///
/// Execution
///
/// Raw executor results, folded into a `DeleteReport` by the session.
///

pub(crate) struct Execution {
    pub(crate) state: DeleteState,
    pub(crate) root_status: BTreeMap<EntityRef, RootStatus>,
    pub(crate) outcomes: BTreeMap<EntityRef, NodeOutcome>,
    pub(crate) nulled: Vec<LinkRef>,
    pub(crate) errors: Vec<RootFailure>,
}

///
/// SegmentStatus
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SegmentStatus {
    Pending,
    Committed,
    Failed,
    Cancelled,
}

///
/// StepError
///

enum StepError {
    Store {
        entity: EntityRef,
        err: InternalError,
    },
    Cancelled,
}

impl StepError {
    const fn store(entity: EntityRef, err: InternalError) -> Self {
        Self::Store { entity, err }
    }
}

///
/// SegmentDone
///

struct SegmentDone {
    deleted: Vec<EntityRef>,
    unlinked: u64,
    nulled: Vec<LinkRef>,
}

///
/// Executor
///

pub(crate) struct Executor<'a> {
    store: &'a mut dyn EntityStore,
    config: &'a DeleteConfig,
    cancel: &'a CancelToken,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        store: &'a mut dyn EntityStore,
        config: &'a DeleteConfig,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            store,
            config,
            cancel,
        }
    }

    pub(crate) fn execute(&mut self, plan: &mut DeletePlan) -> Result<Execution, DeleteError> {
        self.store.begin()?;

        let execution = match self.run(plan) {
            Ok(execution) => execution,
            Err(err) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!(error = %rollback, "rollback after executor failure failed");
                }
                return Err(err);
            }
        };

        if self.config.verify_after_commit {
            self.verify(&execution.outcomes)?;
        }

        Ok(execution)
    }

    fn run(&mut self, plan: &mut DeletePlan) -> Result<Execution, DeleteError> {
        let segments = assign_segments(plan);
        let mut statuses = vec![SegmentStatus::Pending; plan.roots.len()];
        let mut outcomes = BTreeMap::new();
        let mut nulled = Vec::new();
        let mut errors = Vec::new();
        let mut deleted = BTreeSet::new();
        let mut excluded = BTreeSet::new();

        for index in 0..plan.roots.len() {
            let root = plan.roots[index];
            if self.cancel.is_cancelled() {
                statuses[index..].fill(SegmentStatus::Cancelled);
                break;
            }

            let savepoint = self.store.savepoint()?;
            if !excluded.is_empty() {
                plan.settle(&excluded, false, ActionCause::Resettled);
            }

            let members: Vec<EntityRef> = segments
                .iter()
                .filter(|(_, segment)| **segment == index)
                .map(|(entity, _)| *entity)
                .collect();
            debug!(%root, segment = index, nodes = members.len(), "executing segment");

            match self.run_segment(plan, &members, &deleted) {
                Ok(done) => {
                    self.store.release(savepoint)?;
                    statuses[index] = SegmentStatus::Committed;

                    for entity in &members {
                        if let Some(node) = plan.nodes.get(entity) {
                            outcomes.insert(*entity, NodeOutcome::committed(node));
                        }
                    }
                    sink::record(MetricsEvent::RootCommitted {
                        kind: root.kind,
                        deleted: done.deleted.len() as u64,
                        unlinked: done.unlinked,
                    });
                    deleted.extend(done.deleted);
                    nulled.extend(done.nulled);
                }
                Err(StepError::Store { entity, err }) => {
                    self.store.rollback_to(savepoint)?;
                    statuses[index] = SegmentStatus::Failed;

                    let failure = root_failure(plan, root, entity, err);
                    warn!(%root, %entity, error = %failure.message, "segment rolled back");
                    sink::record(MetricsEvent::RootRolledBack { kind: root.kind });
                    errors.push(failure);

                    for entity in &members {
                        outcomes.insert(*entity, NodeOutcome::Failed);
                    }
                    excluded.extend(members);

                    if self.config.mode == DeleteMode::AllOrNothing {
                        self.store.rollback()?;
                        return Ok(abandoned(plan, errors));
                    }
                }
                Err(StepError::Cancelled) => {
                    self.store.rollback_to(savepoint)?;
                    debug!(%root, "segment cancelled");
                    statuses[index..].fill(SegmentStatus::Cancelled);
                    break;
                }
            }
        }

        self.store.commit()?;

        // denied rows outside every segment were never going to be written
        for node in plan.nodes.values() {
            let fallback = if node.cause == Some(ActionCause::Denied) {
                NodeOutcome::DeniedWarning
            } else {
                NodeOutcome::Failed
            };
            outcomes.entry(node.entity).or_insert(fallback);
        }

        let root_status: BTreeMap<EntityRef, RootStatus> = plan
            .roots
            .iter()
            .enumerate()
            .map(|(index, root)| {
                let landed = segments.get(root).copied().unwrap_or(index);
                (*root, combine(statuses[index], statuses[landed]))
            })
            .collect();

        let state = if statuses.contains(&SegmentStatus::Cancelled) {
            DeleteState::Cancelled
        } else if root_status.values().any(|s| *s == RootStatus::Failed) {
            DeleteState::PartiallyFailed
        } else {
            DeleteState::Completed
        };

        Ok(Execution {
            state,
            root_status,
            outcomes,
            nulled,
            errors,
        })
    }

    fn run_segment(
        &mut self,
        plan: &DeletePlan,
        members: &[EntityRef],
        deleted_before: &BTreeSet<EntityRef>,
    ) -> Result<SegmentDone, StepError> {
        let deletes: BTreeSet<EntityRef> = members
            .iter()
            .filter(|entity| {
                plan.nodes
                    .get(entity)
                    .is_some_and(|node| node.live && node.is_deleted())
            })
            .copied()
            .collect();

        // nullable references
        let mut nulled = Vec::new();
        let mut cleared = BTreeSet::new();
        for entity in &deletes {
            let Some(node) = plan.nodes.get(entity) else {
                continue;
            };
            for link in &node.nullable_referrers {
                if deleted_before.contains(&link.source) {
                    continue;
                }
                self.check_cancel()?;
                if cleared.insert((link.source, link.field)) {
                    self.store
                        .null_field(link.source, link.field)
                        .map_err(|err| StepError::store(link.source, err))?;
                }
                if !deletes.contains(&link.source) {
                    nulled.push(*link);
                }
            }
        }
        if !nulled.is_empty() {
            sink::record(MetricsEvent::FieldsNulled {
                kind: nulled[0].source.kind,
                fields: nulled.len() as u64,
            });
        }

        // references held by rows that stay behind
        let mut unlinked = 0;
        for link in plan.detached_links(&plan.live_entities()) {
            if !deletes.contains(&link.target) {
                continue;
            }
            self.check_cancel()?;
            self.store
                .unlink(link)
                .map_err(|err| StepError::store(link.source, err))?;
            unlinked += 1;
        }

        // holders before the rows they reference
        let mut blockers: BTreeMap<EntityRef, usize> = BTreeMap::new();
        let mut holds: BTreeMap<EntityRef, Vec<EntityRef>> = BTreeMap::new();
        for entity in &deletes {
            let holders: BTreeSet<EntityRef> = plan
                .nodes
                .get(entity)
                .into_iter()
                .flat_map(|node| node.referrers.iter())
                .map(|link| link.source)
                .filter(|source| source != entity && deletes.contains(source))
                .collect();

            blockers.insert(*entity, holders.len());
            for holder in holders {
                holds.entry(holder).or_default().push(*entity);
            }
        }

        let key = |entity: EntityRef| {
            let (is_root, depth) = plan
                .nodes
                .get(&entity)
                .map_or((false, 0), |node| (node.role == NodeRole::Root, node.depth));
            (is_root, Reverse(depth), entity)
        };

        let mut ready: BTreeSet<_> = blockers
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(entity, _)| key(*entity))
            .collect();
        let mut remaining = deletes;
        let mut done = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            // a reference cycle falls back to the first remaining row
            let next = match ready.pop_first() {
                Some((_, _, entity)) => entity,
                None => match remaining.iter().map(|entity| key(*entity)).min() {
                    Some((_, _, entity)) => entity,
                    None => break,
                },
            };
            if !remaining.remove(&next) {
                continue;
            }

            self.check_cancel()?;
            self.store
                .delete(next)
                .map_err(|err| StepError::store(next, err))?;
            done.push(next);

            for target in holds.get(&next).into_iter().flatten() {
                if let Some(count) = blockers.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 && remaining.contains(target) {
                        ready.insert(key(*target));
                    }
                }
            }
        }

        Ok(SegmentDone {
            deleted: done,
            unlinked,
            nulled,
        })
    }

    fn check_cancel(&self) -> Result<(), StepError> {
        if self.cancel.is_cancelled() {
            Err(StepError::Cancelled)
        } else {
            Ok(())
        }
    }

    // Deleted rows are gone and every other row is still there.
    fn verify(&self, outcomes: &BTreeMap<EntityRef, NodeOutcome>) -> Result<(), DeleteError> {
        for (entity, outcome) in outcomes {
            let present = self.store.get(*entity)?.is_some();
            let expected = *outcome != NodeOutcome::Deleted;

            if present != expected {
                return Err(InternalError::executor_invariant(format!(
                    "post-commit check failed: {entity} reported {outcome} but is {}",
                    if present { "present" } else { "absent" }
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// Segment of every live node: the last root (in request order) that reaches
/// it, raised until no row is deleted in an earlier segment than a row that
/// still references it.
fn assign_segments(plan: &DeletePlan) -> BTreeMap<EntityRef, usize> {
    let mut segments: BTreeMap<EntityRef, usize> = plan
        .nodes
        .values()
        .filter(|node| node.live)
        .map(|node| {
            let segment = node
                .reachable_from
                .iter()
                .filter_map(|root| plan.root_index(*root))
                .max()
                .unwrap_or_default();
            (node.entity, segment)
        })
        .collect();

    loop {
        let mut changed = false;

        for node in plan.nodes.values().filter(|node| node.live && node.is_deleted()) {
            for link in &node.referrers {
                let holder_deleted = plan
                    .nodes
                    .get(&link.source)
                    .is_some_and(|holder| holder.live && holder.is_deleted());
                if !holder_deleted {
                    continue;
                }

                let (Some(&held), Some(&holder)) =
                    (segments.get(&node.entity), segments.get(&link.source))
                else {
                    continue;
                };
                if holder > held {
                    segments.insert(node.entity, holder);
                    changed = true;
                }
            }
        }

        if !changed {
            return segments;
        }
    }
}

const fn combine(own: SegmentStatus, landed: SegmentStatus) -> RootStatus {
    match (own, landed) {
        (SegmentStatus::Failed, _) | (_, SegmentStatus::Failed) => RootStatus::Failed,
        (SegmentStatus::Committed, SegmentStatus::Committed) => RootStatus::Completed,
        _ => RootStatus::Cancelled,
    }
}

// All-or-nothing: the whole transaction is gone.
fn abandoned(plan: &DeletePlan, errors: Vec<RootFailure>) -> Execution {
    Execution {
        state: DeleteState::PartiallyFailed,
        root_status: plan
            .roots
            .iter()
            .map(|root| (*root, RootStatus::Failed))
            .collect(),
        outcomes: plan
            .nodes
            .keys()
            .map(|entity| (*entity, NodeOutcome::Failed))
            .collect(),
        nulled: Vec::new(),
        errors,
    }
}

fn root_failure(
    plan: &DeletePlan,
    root: EntityRef,
    entity: EntityRef,
    err: InternalError,
) -> RootFailure {
    let err = DeleteError::from_store(err);
    let cause = match &err {
        DeleteError::ConstraintViolation {
            referenced_by,
            field,
            ..
        } => format!(
            "still referenced through {}.{field} ({referenced_by})",
            referenced_by.kind
        ),
        DeleteError::Internal(internal) => internal.message.clone(),
        other => other.to_string(),
    };

    let message = match plan.node(entity).and_then(|node| node.via()) {
        Some(via) => format!("{entity} reached via {via}: {cause}"),
        None => format!("{entity}: {cause}"),
    };

    RootFailure {
        root,
        class: err.class(),
        message,
    }
}
