use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid delete config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("resolve_workers must be at least 1")]
    ZeroWorkers,

    #[error("max_plan_nodes must be at least 1 when set")]
    ZeroPlanLimit,
}

///
/// DeleteMode
///
/// How a denied or failed dependent affects the rest of a request.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Denied dependents are kept with a warning; each root commits or
    /// rolls back on its own.
    #[default]
    PerNode,

    /// Any denial aborts the request and any failure rolls back every root.
    AllOrNothing,
}

///
/// DeleteConfig
///
/// Engine configuration shared by every request of a session.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeleteConfig {
    pub mode: DeleteMode,

    /// Threads used for per-wave store reads during resolution.
    pub resolve_workers: usize,

    /// Re-read every touched ref after commit.
    pub verify_after_commit: bool,

    /// Reject plans larger than this before any mutation.
    pub max_plan_nodes: Option<usize>,

    /// Extra namespaces added to the registry's unshareable table.
    pub unshareable_namespaces: Vec<String>,
}

impl DeleteConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: DeleteMode::PerNode,
            resolve_workers: 1,
            verify_after_commit: true,
            max_plan_nodes: None,
            unshareable_namespaces: Vec::new(),
        }
    }

    #[must_use]
    pub const fn all_or_nothing() -> Self {
        Self {
            mode: DeleteMode::AllOrNothing,
            resolve_workers: 1,
            verify_after_commit: true,
            max_plan_nodes: None,
            unshareable_namespaces: Vec::new(),
        }
    }

    /// Parse and validate a JSON document; missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;

        Ok(config)
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.resolve_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if matches!(self.max_plan_nodes, Some(0)) {
            return Err(ConfigError::ZeroPlanLimit);
        }

        Ok(())
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: DeleteMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_resolve_workers(mut self, workers: usize) -> Self {
        self.resolve_workers = workers;
        self
    }

    #[must_use]
    pub const fn with_verify_after_commit(mut self, verify: bool) -> Self {
        self.verify_after_commit = verify;
        self
    }

    #[must_use]
    pub const fn with_max_plan_nodes(mut self, limit: usize) -> Self {
        self.max_plan_nodes = Some(limit);
        self
    }

    #[must_use]
    pub fn with_unshareable_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.unshareable_namespaces.push(namespace.into());
        self
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self::new()
    }
}
