use crate::{
    config::DeleteMode,
    delete::{
        CancelToken, DeleteError, DeleteState, DeleteWarning,
        plan::{ActionCause, DeletePlan, NodeRole, PlanAction},
    },
    model::EntityRef,
    obs::sink::{self, MetricsEvent},
    security::{AccessAction, Authorization, PermissionOracle, Principal},
    store::EntityStore,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

///
/// Gate
///
/// Authorizes every node that will be written. Dependents that are denied
/// are kept and reported; a denied root aborts the request.
///

pub(crate) struct Gate<'a> {
    store: &'a dyn EntityStore,
    oracle: &'a dyn PermissionOracle,
    principal: &'a Principal,
    mode: DeleteMode,
    skip_head: bool,
    cancel: &'a CancelToken,
    cache: BTreeMap<(EntityRef, AccessAction), Authorization>,
}

impl<'a> Gate<'a> {
    pub(crate) fn new(
        store: &'a dyn EntityStore,
        oracle: &'a dyn PermissionOracle,
        principal: &'a Principal,
        mode: DeleteMode,
        skip_head: bool,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            store,
            oracle,
            principal,
            mode,
            skip_head,
            cancel,
            cache: BTreeMap::new(),
        }
    }

    /// Authorize until stable; returns the warnings for kept dependents.
    pub(crate) fn authorize(
        &mut self,
        plan: &mut DeletePlan,
    ) -> Result<Vec<DeleteWarning>, DeleteError> {
        let mut warnings = Vec::new();

        loop {
            let mut denied = false;

            // roots first, in request order
            let roots: BTreeSet<EntityRef> = plan.roots.iter().copied().collect();
            let mut order: Vec<EntityRef> = plan.roots.clone();
            order.extend(plan.nodes.keys().filter(|entity| !roots.contains(entity)));

            for entity in order {
                if self.cancel.is_cancelled() {
                    return Err(DeleteError::Cancelled {
                        phase: DeleteState::Authorizing,
                    });
                }

                let Some(node) = plan.nodes.get(&entity) else {
                    continue;
                };
                if !node.live || node.cause == Some(ActionCause::Denied) {
                    continue;
                }
                let role = node.role;
                let Some(action) = self.required_action(entity, role, node.action) else {
                    continue;
                };

                let authorization = self.check(entity, action)?;
                if authorization.is_authorized() {
                    if let Some(node) = plan.nodes.get_mut(&entity) {
                        node.authorized = true;
                    }
                    continue;
                }

                if role == NodeRole::Root || self.mode == DeleteMode::AllOrNothing {
                    return Err(self.violation(entity, authorization)?);
                }

                warn!(%entity, %action, %authorization, "dependent denied; keeping it");
                sink::record(MetricsEvent::NodeDenied { kind: entity.kind });
                warnings.push(DeleteWarning {
                    entity,
                    action,
                    authorization,
                    message: format!(
                        "user {} may not {action} {entity}; kept",
                        self.principal.user_id
                    ),
                });

                if let Some(node) = plan.nodes.get_mut(&entity) {
                    node.action = PlanAction::Keep;
                    node.cause = Some(ActionCause::Denied);
                    node.authorized = false;
                }
                denied = true;
            }

            if !denied {
                break;
            }

            debug!(warnings = warnings.len(), "re-settling after denials");
            plan.settle(&BTreeSet::new(), true, ActionCause::Shared);
        }

        Ok(warnings)
    }

    // What the principal must be allowed to do for this node to be written.
    // Removing a link row only detaches its endpoints.
    const fn required_action(
        &self,
        entity: EntityRef,
        role: NodeRole,
        action: PlanAction,
    ) -> Option<AccessAction> {
        match (role, action) {
            (NodeRole::Root, _) if self.skip_head => Some(AccessAction::Unlink),
            (NodeRole::Root, _) => Some(AccessAction::Delete),
            (NodeRole::Head | NodeRole::Endpoint, _) => Some(AccessAction::Unlink),
            (NodeRole::Dependent, PlanAction::Delete) if entity.kind.is_link() => {
                Some(AccessAction::Unlink)
            }
            (NodeRole::Dependent, PlanAction::Delete) => Some(AccessAction::Delete),
            (NodeRole::Dependent, PlanAction::Unlink) => Some(AccessAction::Unlink),
            (NodeRole::Dependent, PlanAction::Keep) => None,
        }
    }

    fn check(
        &mut self,
        entity: EntityRef,
        action: AccessAction,
    ) -> Result<Authorization, DeleteError> {
        if let Some(cached) = self.cache.get(&(entity, action)) {
            return Ok(*cached);
        }

        let authorization = self
            .oracle
            .authorize(self.store, entity, self.principal, action)?;
        self.cache.insert((entity, action), authorization);

        Ok(authorization)
    }

    fn violation(
        &self,
        entity: EntityRef,
        authorization: Authorization,
    ) -> Result<DeleteError, DeleteError> {
        let err = match authorization {
            Authorization::DeniedReadOnly => {
                let ownership = self.oracle.owner_and_group_of(self.store, entity)?;
                DeleteError::ReadOnlyGroupSecurityViolation {
                    entity,
                    group_id: ownership.group_id,
                }
            }
            _ => DeleteError::SecurityViolation {
                entity,
                user_id: self.principal.user_id,
            },
        };

        warn!(%entity, %authorization, "delete denied");

        Ok(err)
    }
}
