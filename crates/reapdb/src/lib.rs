//! ## Crate layout
//! - `core`: delete graph registry, store and oracle boundaries,
//!   the cascading delete pipeline, and observability.
//!
//! The `prelude` module mirrors what a caller needs to issue a delete and
//! read its report; adapters and metrics plumbing stay under `core`.

pub use reapdb_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//
// Errors
//

pub use crate::core::{delete::DeleteError as Error, error::InternalError};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        model::{EntityRecord, LinkRef, Ownership},
        prelude::*,
        security::{GroupPermissions, GroupPolicyOracle},
        store::{EntityStore as _, MemoryStore},
    };
    pub use serde::{Deserialize, Serialize};
}
