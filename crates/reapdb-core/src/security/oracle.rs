use crate::{
    error::InternalError,
    model::{EntityRef, Ownership},
    security::{AccessAction, Authorization, GroupPermissions, PermissionOracle, Principal},
    store::EntityStore,
};
use std::collections::BTreeMap;

///
/// GroupPolicyOracle
///
/// Reference oracle driven by a group permission directory.
///
/// Rules, first match wins:
/// - non-ownable rows and their owner are always authorized
/// - system administrators are authorized
/// - unknown groups and non-members are denied
/// - leaders are authorized unless the group is read-only
/// - members follow the group level; read-annotate groups allow unlink only
///

#[derive(Clone, Debug, Default)]
pub struct GroupPolicyOracle {
    groups: BTreeMap<i64, GroupPermissions>,
}

impl GroupPolicyOracle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_group(mut self, group_id: i64, permissions: GroupPermissions) -> Self {
        self.groups.insert(group_id, permissions);
        self
    }

    #[must_use]
    pub fn permissions_of(&self, group_id: i64) -> Option<GroupPermissions> {
        self.groups.get(&group_id).copied()
    }

    fn decide(
        &self,
        details: Ownership,
        principal: &Principal,
        action: AccessAction,
    ) -> Authorization {
        if details.owner_id == principal.user_id || principal.admin {
            return Authorization::Authorized;
        }

        let Some(permissions) = self.permissions_of(details.group_id) else {
            return Authorization::Denied;
        };
        if !principal.is_member(details.group_id) {
            return Authorization::Denied;
        }

        if principal.is_leader(details.group_id) {
            return match permissions {
                GroupPermissions::ReadOnly => Authorization::DeniedReadOnly,
                _ => Authorization::Authorized,
            };
        }

        match (permissions, action) {
            (GroupPermissions::ReadWrite, _)
            | (GroupPermissions::ReadAnnotate, AccessAction::Unlink) => Authorization::Authorized,
            (GroupPermissions::ReadOnly, _) => Authorization::DeniedReadOnly,
            (GroupPermissions::Private | GroupPermissions::ReadAnnotate, _) => {
                Authorization::Denied
            }
        }
    }
}

impl PermissionOracle for GroupPolicyOracle {
    fn owner_and_group_of(
        &self,
        store: &dyn EntityStore,
        entity: EntityRef,
    ) -> Result<Ownership, InternalError> {
        store
            .get(entity)?
            .map(|record| record.details)
            .ok_or_else(|| InternalError::store_not_found(entity))
    }

    fn authorize(
        &self,
        store: &dyn EntityStore,
        entity: EntityRef,
        principal: &Principal,
        action: AccessAction,
    ) -> Result<Authorization, InternalError> {
        let details = self.owner_and_group_of(store, entity)?;
        if !entity.kind.capabilities().ownable {
            return Ok(Authorization::Authorized);
        }

        Ok(self.decide(details, principal, action))
    }
}
