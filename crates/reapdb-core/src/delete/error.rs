use crate::{
    delete::DeleteState,
    error::{ErrorClass, ErrorDetail, InternalError, StoreError},
    model::EntityRef,
    security::{AccessAction, Authorization},
    spec::RegistryError,
};
use serde::Serialize;
use thiserror::Error as ThisError;

///
/// DeleteError
///
/// Request-level error taxonomy.
///
/// Configuration and root authorization errors propagate to the caller;
/// everything that happens to dependents is absorbed into the report.
///

#[derive(Debug, ThisError)]
pub enum DeleteError {
    #[error("configuration error: {0}")]
    Configuration(#[from] RegistryError),

    #[error("security violation: user {user_id} may not delete {entity}")]
    SecurityViolation { entity: EntityRef, user_id: i64 },

    #[error("read-only group security violation: {entity} belongs to read-only group {group_id}")]
    ReadOnlyGroupSecurityViolation { entity: EntityRef, group_id: i64 },

    #[error("constraint violation: {entity} is still referenced by {referenced_by}.{field}")]
    ConstraintViolation {
        entity: EntityRef,
        referenced_by: EntityRef,
        field: &'static str,
    },

    #[error("delete cancelled while {phase}")]
    Cancelled { phase: DeleteState },

    #[error("plan has {nodes} nodes, over the configured limit of {limit}")]
    PlanTooLarge { nodes: usize, limit: usize },

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl DeleteError {
    /// Lift a store failure, surfacing foreign-key violations structurally.
    /// Segment failures go through here before they land in the report.
    #[must_use]
    pub fn from_store(err: InternalError) -> Self {
        match err.detail {
            Some(ErrorDetail::Store(StoreError::ConstraintViolation {
                entity,
                referenced_by,
                field,
            })) => Self::ConstraintViolation {
                entity,
                referenced_by,
                field,
            },
            _ => Self::Internal(err),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Configuration(_) | Self::PlanTooLarge { .. } => ErrorClass::Configuration,
            Self::SecurityViolation { .. } | Self::ReadOnlyGroupSecurityViolation { .. } => {
                ErrorClass::Unauthorized
            }
            Self::ConstraintViolation { .. } => ErrorClass::Conflict,
            Self::Cancelled { .. } => ErrorClass::Cancelled,
            Self::Internal(err) => err.class,
        }
    }

    /// Terminal request state an error stands for, if it ends the lifecycle.
    #[must_use]
    pub const fn terminal_state(&self) -> Option<DeleteState> {
        match self {
            Self::SecurityViolation { .. } | Self::ReadOnlyGroupSecurityViolation { .. } => {
                Some(DeleteState::Denied)
            }
            Self::Cancelled { .. } => Some(DeleteState::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::SecurityViolation { .. } | Self::ReadOnlyGroupSecurityViolation { .. }
        )
    }
}

///
/// DeleteWarning
///
/// A dependent that was denied and kept; the request carried on without it.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DeleteWarning {
    pub entity: EntityRef,
    pub action: AccessAction,
    pub authorization: Authorization,
    pub message: String,
}

///
/// RootFailure
///
/// Why one root ended Failed or Cancelled. The message names the relation
/// through which the offending row was reached.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RootFailure {
    pub root: EntityRef,
    pub class: ErrorClass,
    pub message: String,
}
