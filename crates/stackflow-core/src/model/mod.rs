//! Resolution data model
//!
//! Input specs as supplied by the declarative layer, and the resolved
//! entities and status handed back.

mod cluster;
mod domain;
mod machine;
mod network;
mod placement;
mod status;

// Re-exports
pub use cluster::*;
pub use domain::*;
pub use machine::*;
pub use network::*;
pub use placement::*;
pub use status::*;
