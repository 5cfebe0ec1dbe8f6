//! Status reported back to the caller

use super::cluster::Endpoint;
use super::network::Network;
use super::placement::FailureDomain;
use crate::error::{ErrorClass, ResolveError, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved zone as it appears in status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub name: String,
    pub id: String,
    pub network: Network,
}

/// Which part of the reconciliation a condition reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    DomainResolved,
    FailureDomainsReady,
    EndpointReady,
    AffinityGroupsReady,
    /// Assembly of the status itself
    StatusProjected,
    MachineReady,
}

/// Structured condition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorClass>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ResourceRef>,
}

impl Condition {
    pub fn ok(kind: ConditionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            ok: true,
            reason: None,
            message: message.into(),
            target: None,
        }
    }

    pub fn failed(kind: ConditionKind, err: &ResolveError) -> Self {
        Self {
            kind,
            ok: false,
            reason: Some(err.class()),
            message: err.to_string(),
            target: Some(err.target().clone()),
        }
    }

    /// Not failed, but waiting on the platform
    pub fn pending(kind: ConditionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            ok: false,
            reason: None,
            message: message.into(),
            target: None,
        }
    }
}

/// Cluster infrastructure status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Resolved zones keyed by zone id
    pub zones: BTreeMap<String, ZoneStatus>,
    #[serde(default)]
    pub failure_domains: Vec<FailureDomain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    /// Affinity group name to id
    #[serde(default)]
    pub affinity_groups: BTreeMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub ready: bool,
}

impl ClusterStatus {
    /// Replace the condition of the same kind, or append
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.kind == condition.kind) {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    pub fn condition(&self, kind: ConditionKind) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// Zone used when a machine names no failure domain
    pub fn default_zone(&self) -> Option<&ZoneStatus> {
        self.failure_domains
            .iter()
            .filter_map(|fd| fd.zone_id.as_ref())
            .find_map(|id| self.zones.get(id))
            .or_else(|| self.zones.values().next())
    }
}
