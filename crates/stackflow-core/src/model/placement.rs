//! Failure domains and affinity groups

use super::network::ZoneSpec;
use serde::{Deserialize, Serialize};
use stackflow_cloud::Scope;

/// Declared failure domain
///
/// `domain` and `account` override the cluster-level values for this entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailureDomainSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub zone: ZoneSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl FailureDomainSpec {
    pub fn new(zone: ZoneSpec) -> Self {
        Self {
            zone,
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>, zone: ZoneSpec) -> Self {
        Self {
            name: Some(name.into()),
            zone,
            ..Default::default()
        }
    }

    /// Identity used for deduplication; declared ids win over names
    pub fn pair_key(&self) -> (&str, &str) {
        (self.zone.identity(), self.zone.network.identity())
    }
}

/// A failure domain of the cluster's placement set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDomain {
    pub name: String,
    pub zone_name: String,
    pub network_name: String,
    /// Set once the zone is resolved; required for cluster assembly
    pub zone_id: Option<String>,
    pub network_id: Option<String>,
    pub scope: Scope,
}

impl FailureDomain {
    pub fn is_eligible(&self) -> bool {
        self.zone_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Placement constraint type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffinityType {
    #[serde(rename = "host affinity")]
    Affinity,
    #[serde(rename = "host anti-affinity")]
    AntiAffinity,
}

impl AffinityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffinityType::Affinity => "host affinity",
            AffinityType::AntiAffinity => "host anti-affinity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityGroupSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: AffinityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: AffinityType,
    pub id: String,
}
