//! Core runtime for ReapDB: the delete graph registry, the entity
//! store and permission boundaries, and the cascading delete pipeline.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod delete;
pub mod error;
pub mod model;
pub mod obs;
pub mod security;
pub mod spec;
pub mod store;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary and the session entrypoint.
/// Store adapters, oracles, and metrics plumbing stay in their modules.
///

pub mod prelude {
    pub use crate::{
        config::{DeleteConfig, DeleteMode},
        delete::{
            CancelToken, ChildOption, DeleteError, DeleteReport, DeleteRequest, DeleteSession,
            DeleteState, NodeOutcome, RootStatus,
        },
        model::{EntityKind, EntityRef},
        security::{AccessAction, Authorization, Principal},
        spec::DeleteSpecRegistry,
    };
}
