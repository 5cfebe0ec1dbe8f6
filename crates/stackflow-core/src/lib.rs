//! Stackflow resolution core
//!
//! Turns desired-state descriptions of cloud objects into concrete remote
//! resources, creating what is missing, and converges repeated passes
//! without duplicating anything on the platform.
//!
//! ```text
//! ClusterReconciler
//!   ├─ PathResolver          domain path -> chain of domain ids
//!   ├─ ResourceLocator       find-or-create, race tolerant
//!   │    └─ TagManager       creator marker, per-cluster usage tags
//!   ├─ AvailabilityAggregator  failure-domain set
//!   ├─ EndpointResolver      public IP + load-balancer rule
//!   └─ StatusProjector       ClusterStatus
//! MachineResolver            per machine object
//! ```
//!
//! All remote access goes through [`stackflow_cloud::ResourceApi`]; all
//! policy comes from a [`stackflow_config::ResolverConfig`] passed in by the
//! caller.

pub mod aggregate;
pub mod endpoint;
pub mod error;
pub mod locator;
pub mod machine;
pub mod model;
pub mod outcome;
pub mod path;
pub mod projector;
pub mod reconcile;
pub mod table;
pub mod tags;

// Re-exports
pub use aggregate::AvailabilityAggregator;
pub use endpoint::{EndpointResolver, ResolvedEndpoint};
pub use error::{ErrorClass, ResolveError, ResourceRef, Result};
pub use locator::{LocateQuery, Located, ResourceLocator};
pub use machine::{MachineOutcome, MachineResolver};
pub use model::*;
pub use outcome::{LogSummary, NextStep, Resolution, ResolutionEntry, ResolutionLog};
pub use path::PathResolver;
pub use projector::{ProjectedIds, StatusProjector};
pub use reconcile::{ClusterCache, ClusterReconciler, ReconcileOutcome};
pub use table::ResourceTable;
pub use tags::TagManager;
