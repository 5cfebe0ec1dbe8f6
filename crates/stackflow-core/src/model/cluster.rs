//! Cluster input spec and caller identity

use super::placement::{AffinityGroupSpec, FailureDomainSpec};
use serde::{Deserialize, Serialize};
use stackflow_cloud::TagSet;

/// Caller-side identity of the object being reconciled
///
/// Never interpreted; `uid` is only used verbatim as a tag-key suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectContext {
    pub uid: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

/// Reference to credentials, resolved by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRef {
    pub kind: String,
    pub name: String,
}

/// Control-plane API endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Desired cluster infrastructure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub context: ObjectContext,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<IdentityRef>,
    /// Domain path; the platform root when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub failure_domains: Vec<FailureDomainSpec>,
    #[serde(default)]
    pub control_plane_endpoint: Endpoint,
    #[serde(default)]
    pub affinity_groups: Vec<AffinityGroupSpec>,
    /// Extra tags put on resources created for this cluster
    #[serde(default)]
    pub tags: TagSet,
}
