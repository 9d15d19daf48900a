//! Delete graph registry: what depends on what.

mod policy;
mod registry;
mod relation;
mod standard;


pub use policy::{NS_COMPANION_FILE, UnshareablePolicy};
pub use registry::{DeleteSpecRegistry, RegistryBuilder, RegistryError};
pub use relation::{DeleteSpecNode, Holder, NullableRef, Propagation, Relation};
pub use standard::standard_builder;
