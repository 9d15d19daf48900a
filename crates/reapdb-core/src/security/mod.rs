//! Ownership and permission oracle boundary.

mod oracle;

use crate::{
    error::InternalError,
    model::{EntityRef, Ownership},
    store::EntityStore,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use oracle::GroupPolicyOracle;

///
/// Principal
///
/// The acting user and the group roles that user holds.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Principal {
    pub user_id: i64,
    pub member_of: BTreeSet<i64>,
    pub leader_of: BTreeSet<i64>,
    pub admin: bool,
}

impl Principal {
    #[must_use]
    pub const fn new(user_id: i64) -> Self {
        Self {
            user_id,
            member_of: BTreeSet::new(),
            leader_of: BTreeSet::new(),
            admin: false,
        }
    }

    #[must_use]
    pub fn member(mut self, group_id: i64) -> Self {
        self.member_of.insert(group_id);
        self
    }

    /// Leaders are implicitly members.
    #[must_use]
    pub fn leader(mut self, group_id: i64) -> Self {
        self.member_of.insert(group_id);
        self.leader_of.insert(group_id);
        self
    }

    #[must_use]
    pub const fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    #[must_use]
    pub fn is_member(&self, group_id: i64) -> bool {
        self.member_of.contains(&group_id) || self.leader_of.contains(&group_id)
    }

    #[must_use]
    pub fn is_leader(&self, group_id: i64) -> bool {
        self.leader_of.contains(&group_id)
    }
}

///
/// GroupPermissions
///
/// Permission level of a group, from most to least restrictive.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
pub enum GroupPermissions {
    Private,
    ReadAnnotate,
    ReadOnly,
    ReadWrite,
}

///
/// AccessAction
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AccessAction {
    Delete,
    Unlink,
}

///
/// Authorization
///
/// Tri-state oracle answer. `DeniedReadOnly` is kept distinct because group
/// leaders may act in read-write groups but not in read-only ones.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum Authorization {
    Authorized,
    Denied,
    DeniedReadOnly,
}

impl Authorization {
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

///
/// PermissionOracle
///
/// Answers who owns a row and whether a principal may act on it.
///

pub trait PermissionOracle: Send + Sync {
    fn owner_and_group_of(
        &self,
        store: &dyn EntityStore,
        entity: EntityRef,
    ) -> Result<Ownership, InternalError>;

    fn authorize(
        &self,
        store: &dyn EntityStore,
        entity: EntityRef,
        principal: &Principal,
        action: AccessAction,
    ) -> Result<Authorization, InternalError>;
}
