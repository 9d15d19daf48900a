use crate::{
    delete::{
        ChildOption,
        plan::{ActionCause, DeletePlan, NodeRole, PlanAction},
    },
    model::EntityRef,
    spec::UnshareablePolicy,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Downgrade every dependent matched by a child option to Unlink, then
/// settle so the excluded node's descendants leave the plan.
///
/// Rows claimed by `policy` are deleted whatever the options say.
pub(crate) fn apply_options(
    plan: &mut DeletePlan,
    options: &[ChildOption],
    policy: &UnshareablePolicy,
) -> usize {
    if options.is_empty() {
        return 0;
    }

    let matched: Vec<EntityRef> = plan
        .nodes
        .values()
        .filter(|node| node.live && node.role == NodeRole::Dependent && node.is_deleted())
        .filter(|node| {
            let namespace = node.namespace();
            options
                .iter()
                .any(|option| option.matches(node.entity.kind, namespace))
                && !policy.claims(node.entity.kind, namespace)
        })
        .map(|node| node.entity)
        .collect();

    for entity in &matched {
        if let Some(node) = plan.nodes.get_mut(entity) {
            debug!(%entity, "kept by child option");
            node.action = PlanAction::Unlink;
            node.cause = Some(ActionCause::Option);
        }
    }

    if !matched.is_empty() {
        plan.settle(&BTreeSet::new(), true, ActionCause::Shared);
    }

    matched.len()
}
