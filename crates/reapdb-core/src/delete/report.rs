use crate::{
    delete::{
        DeleteWarning, RootFailure,
        plan::{ActionCause, DeletePlan, PlanAction, PlanNode},
    },
    model::{EntityKind, EntityRef, LinkRef},
};
use derive_more::Display;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

///
/// DeleteState
///
/// Request lifecycle: `Resolving -> Authorizing -> Executing -> {terminal}`.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
#[serde(rename_all = "snake_case")]
pub enum DeleteState {
    #[display("authorizing")]
    Authorizing,
    #[display("cancelled")]
    Cancelled,
    #[display("completed")]
    Completed,
    /// A root was refused before anything was written; carried by the error.
    #[display("denied")]
    Denied,
    #[display("executing")]
    Executing,
    #[display("partially_failed")]
    PartiallyFailed,
    #[display("resolving")]
    Resolving,
}

impl DeleteState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Completed | Self::Denied | Self::PartiallyFailed
        )
    }
}

///
/// RootStatus
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
#[serde(rename_all = "snake_case")]
pub enum RootStatus {
    Cancelled,
    Completed,
    Failed,
    NotFound,
}

///
/// NodeOutcome
///
/// Final state of every plan node.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    Deleted,
    DeniedWarning,
    /// The node's segment failed, rolled back, or never ran.
    Failed,
    KeptByOption,
    /// Shared after an earlier root failed, or no longer reachable.
    KeptShared,
    Unlinked,
}

impl NodeOutcome {
    /// Outcome of a node whose segment committed.
    #[must_use]
    pub(crate) const fn committed(node: &PlanNode) -> Self {
        if matches!(node.cause, Some(ActionCause::Denied)) {
            return Self::DeniedWarning;
        }
        if !node.live {
            return Self::KeptShared;
        }

        match (node.action, node.cause) {
            (PlanAction::Delete, _) => Self::Deleted,
            (PlanAction::Unlink, Some(ActionCause::Option))
            | (PlanAction::Keep, Some(ActionCause::Head)) => Self::KeptByOption,
            (PlanAction::Unlink, Some(ActionCause::Resettled)) => Self::KeptShared,
            (PlanAction::Unlink, _) => Self::Unlinked,
            (PlanAction::Keep, _) => Self::KeptByOption,
        }
    }
}

///
/// DeleteReport
///
/// Everything one request did, serializable for callers and audit logs.
///

#[derive(Clone, Debug, Serialize)]
pub struct DeleteReport {
    pub state: DeleteState,
    #[serde(serialize_with = "serialize_entries")]
    pub per_root_status: BTreeMap<EntityRef, RootStatus>,
    pub deleted_refs: Vec<EntityRef>,
    pub kept_refs: Vec<EntityRef>,
    #[serde(serialize_with = "serialize_entries")]
    pub outcomes: BTreeMap<EntityRef, NodeOutcome>,
    pub nulled: Vec<LinkRef>,
    pub errors: Vec<RootFailure>,
    pub warnings: Vec<DeleteWarning>,
}

impl DeleteReport {
    pub(crate) fn new(
        state: DeleteState,
        plan: &DeletePlan,
        mut per_root_status: BTreeMap<EntityRef, RootStatus>,
        outcomes: BTreeMap<EntityRef, NodeOutcome>,
    ) -> Self {
        for missing in plan.missing() {
            per_root_status.insert(*missing, RootStatus::NotFound);
        }

        let (deleted_refs, kept_refs) = outcomes
            .iter()
            .map(|(entity, outcome)| (*entity, *outcome))
            .partition::<Vec<_>, _>(|(_, outcome)| *outcome == NodeOutcome::Deleted);

        Self {
            state,
            per_root_status,
            deleted_refs: deleted_refs.into_iter().map(|(entity, _)| entity).collect(),
            kept_refs: kept_refs.into_iter().map(|(entity, _)| entity).collect(),
            outcomes,
            nulled: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn root_status(&self, root: EntityRef) -> Option<RootStatus> {
        self.per_root_status.get(&root).copied()
    }

    #[must_use]
    pub fn outcome(&self, entity: EntityRef) -> Option<NodeOutcome> {
        self.outcomes.get(&entity).copied()
    }

    #[must_use]
    pub fn is_deleted(&self, entity: EntityRef) -> bool {
        self.outcome(entity) == Some(NodeOutcome::Deleted)
    }

    /// Deleted rows of one kind, in key order.
    #[must_use]
    pub fn deleted_of(&self, kind: EntityKind) -> Vec<EntityRef> {
        self.deleted_refs
            .iter()
            .filter(|entity| entity.kind == kind)
            .copied()
            .collect()
    }

    #[must_use]
    pub fn count(&self, outcome: NodeOutcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }
}

// JSON object keys must be strings; entity-keyed maps go out as pairs.
fn serialize_entries<S, V>(map: &BTreeMap<EntityRef, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_seq(map.iter())
}
