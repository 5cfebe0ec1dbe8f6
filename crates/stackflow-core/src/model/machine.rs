//! Machines and the offerings they reference

use super::cluster::{IdentityRef, ObjectContext};
use serde::{Deserialize, Serialize};
use stackflow_cloud::ResourceStatus;
use std::collections::BTreeMap;

/// Reference to a platform object by name, id, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ResourceIdentifier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            name: None,
            id: Some(id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.as_deref().unwrap_or("").is_empty() && self.id.as_deref().unwrap_or("").is_empty()
    }

    /// Best label for messages
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Data disk attached at creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskOffering {
    #[serde(flatten)]
    pub offering: ResourceIdentifier,
    pub mount_path: String,
    pub device: String,
    pub filesystem: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_size_gb: Option<u32>,
}

/// Desired machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub context: ObjectContext,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<IdentityRef>,
    /// Set once the instance exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub template: ResourceIdentifier,
    pub offering: ResourceIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_offering: Option<DiskOffering>,
    /// Names of cluster affinity groups the machine joins
    #[serde(default)]
    pub affinity_groups: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    /// Zone id to place the machine in; defaults to the cluster's first zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<String>,
}

/// A resolved machine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    pub instance_id: String,
    pub zone_id: String,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}
