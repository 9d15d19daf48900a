use crate::model::EntityRef;
use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Store adapters, the registry, and the delete pipeline all report
/// through this type; request-level failures wrap it in `DeleteError`.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError with optional origin-specific detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        let message = message.into();

        let detail = match (class, origin) {
            (ErrorClass::InvariantViolation, ErrorOrigin::Store) => {
                Some(ErrorDetail::Store(StoreError::InvariantViolation {
                    message: message.clone(),
                }))
            }
            _ => None,
        };

        Self {
            class,
            origin,
            message,
            detail,
        }
    }

    /// Construct a store-origin invariant violation.
    pub fn store_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Store,
            message.into(),
        )
    }

    /// Construct a store-origin internal error.
    pub fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message.into())
    }

    /// Construct a resolver-origin invariant violation.
    pub(crate) fn resolver_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Resolver,
            message.into(),
        )
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct a standardized missing-row error.
    pub fn store_not_found(entity: EntityRef) -> Self {
        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Store,
            message: format!("entity not found: {entity}"),
            detail: Some(ErrorDetail::Store(StoreError::NotFound { entity })),
        }
    }

    /// Construct a foreign-key violation raised by a store write.
    pub fn constraint_violation(
        entity: EntityRef,
        referenced_by: EntityRef,
        field: &'static str,
    ) -> Self {
        Self {
            class: ErrorClass::Conflict,
            origin: ErrorOrigin::Store,
            message: format!(
                "constraint violation: {entity} is still referenced by {referenced_by}.{field}"
            ),
            detail: Some(ErrorDetail::Store(StoreError::ConstraintViolation {
                entity,
                referenced_by,
                field,
            })),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Store(StoreError::NotFound { .. }))
        )
    }

    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Store(StoreError::ConstraintViolation { .. }))
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Clone, Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
}

///
/// StoreError
///
/// Store-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Store`].
///

#[derive(Clone, Debug, ThisError)]
pub enum StoreError {
    #[error("entity not found: {entity}")]
    NotFound { entity: EntityRef },

    #[error("{entity} is still referenced by {referenced_by}.{field}")]
    ConstraintViolation {
        entity: EntityRef,
        referenced_by: EntityRef,
        field: &'static str,
    },

    #[error("store invariant violation: {message}")]
    InvariantViolation { message: String },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Configuration,
    Unauthorized,
    Conflict,
    NotFound,
    Cancelled,
    Internal,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Registry,
    Store,
    Resolver,
    Options,
    Gate,
    Executor,
    Report,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Registry => "registry",
            Self::Store => "store",
            Self::Resolver => "resolver",
            Self::Options => "options",
            Self::Gate => "gate",
            Self::Executor => "executor",
            Self::Report => "report",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[test]
    fn constraint_violation_carries_store_detail() {
        let image = EntityRef::new(EntityKind::Image, 7);
        let sample = EntityRef::new(EntityKind::WellSample, 3);
        let err = InternalError::constraint_violation(image, sample, "image");

        assert!(err.is_constraint_violation());
        assert!(!err.is_not_found());
        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(
            err.display_with_class(),
            "store:conflict: constraint violation: Image:7 is still referenced by WellSample:3.image"
        );
    }

    #[test]
    fn store_invariant_populates_detail() {
        let err = InternalError::store_invariant("savepoint released twice");

        assert!(matches!(
            err.detail,
            Some(ErrorDetail::Store(StoreError::InvariantViolation { .. }))
        ));
    }
}
