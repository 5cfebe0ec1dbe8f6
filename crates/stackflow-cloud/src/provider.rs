//! Remote platform contract
//!
//! The resolver depends only on this narrow interface. Backends translate
//! it to the platform's real API; [`MemoryCloud`](crate::MemoryCloud) keeps
//! everything in process.

use crate::error::Result;
use crate::resource::{RemoteResource, ResourceKind, Scope};
use crate::tags::TagSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource operations offered by the platform
///
/// Implementations are not expected to deduplicate creates. Callers supply
/// idempotency by re-checking state before writing.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Backend name for logging (e.g. "cloudstack", "memory")
    fn name(&self) -> &str;

    /// List resources of `kind` matching every field set in `filter`
    async fn list(&self, kind: ResourceKind, filter: &ResourceFilter) -> Result<Vec<RemoteResource>>;

    /// Create a resource together with `spec.tags`
    ///
    /// The tags are written with the resource, never after it. May fail
    /// with `ResourceAlreadyExists`.
    async fn create(&self, kind: ResourceKind, spec: &CreateSpec) -> Result<RemoteResource>;

    /// Set tags on a resource; existing keys are overwritten
    async fn tag(&self, resource_id: &str, tags: &TagSet) -> Result<()>;

    /// Remove tag keys from a resource; unknown keys are ignored
    async fn untag(&self, resource_id: &str, keys: &[String]) -> Result<()>;

    /// Read the tags of a resource
    async fn list_tags(&self, resource_id: &str) -> Result<TagSet>;

    /// Delete a resource
    async fn delete(&self, resource_id: &str) -> Result<()>;
}

/// Filter for [`ResourceApi::list`]; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub zone_id: Option<String>,
    pub scope: Scope,
    /// Only match resources with no parent (top-level domains)
    #[serde(default)]
    pub top_level: bool,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: Option<&str>) -> Self {
        match parent_id {
            Some(p) => self.parent_id = Some(p.to_string()),
            None => self.top_level = true,
        }
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Whether `resource` passes this filter
    pub fn matches(&self, resource: &RemoteResource) -> bool {
        if let Some(id) = &self.id {
            if &resource.id != id {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if &resource.name != name {
                return false;
            }
        }
        if self.top_level && resource.parent_id.is_some() {
            return false;
        }
        if let Some(parent) = &self.parent_id {
            if resource.parent_id.as_ref() != Some(parent) {
                return false;
            }
        }
        if let Some(zone) = &self.zone_id {
            if resource.zone_id.as_ref() != Some(zone) {
                return false;
            }
        }
        resource.scope.visible_from(&self.scope)
    }
}

/// Payload for [`ResourceApi::create`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSpec {
    pub name: String,
    pub parent_id: Option<String>,
    pub zone_id: Option<String>,
    pub scope: Scope,
    /// Kind-specific settings (offering ids, network type, port, ...)
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: TagSet,
}

impl CreateSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: Option<&str>) -> Self {
        self.parent_id = parent_id.map(str::to_string);
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Add tags written as part of the create
    pub fn with_tags(mut self, tags: &TagSet) -> Self {
        self.tags.extend(tags);
        self
    }
}
