//! Stackflow Cloud Platform Contract
//!
//! This crate defines the narrow interface the resolver core uses to talk to
//! the cloud platform, plus the remote resource model shared by every backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackflow-core                   │
//! │   (path resolver, locator, tags, reconciler)     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Platform Contract                │   │
//! │  │  trait ResourceApi { list, create, ... }  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ RemoteResource│  │    TagSet    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   platform    │ │  MemoryCloud  │
//! │ (caller's own)│ │  (in-process) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod provider;
pub mod resource;
pub mod tags;

// Re-exports
pub use error::{CloudError, Result};
pub use memory::{MemoryCloud, Operation};
pub use provider::{CreateSpec, ResourceApi, ResourceFilter};
pub use resource::{RemoteResource, ResourceKind, ResourceStatus, Scope};
pub use tags::{Tag, TagSet};
