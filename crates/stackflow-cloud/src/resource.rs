//! Remote resource model
//!
//! What the platform reports back for a listed or created resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kinds of remote resources the resolver works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Domain,
    Account,
    Zone,
    Network,
    PublicIp,
    LoadBalancerRule,
    AffinityGroup,
    DiskOffering,
    ServiceOffering,
    Template,
    Machine,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Domain => write!(f, "domain"),
            ResourceKind::Account => write!(f, "account"),
            ResourceKind::Zone => write!(f, "zone"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::PublicIp => write!(f, "public-ip"),
            ResourceKind::LoadBalancerRule => write!(f, "load-balancer-rule"),
            ResourceKind::AffinityGroup => write!(f, "affinity-group"),
            ResourceKind::DiskOffering => write!(f, "disk-offering"),
            ResourceKind::ServiceOffering => write!(f, "service-offering"),
            ResourceKind::Template => write!(f, "template"),
            ResourceKind::Machine => write!(f, "machine"),
        }
    }
}

/// Domain/account ownership scope of a resource
///
/// An empty scope means "global": zones, offerings and templates are not
/// owned by a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub domain_id: Option<String>,
    pub account_id: Option<String>,
}

impl Scope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn domain(domain_id: impl Into<String>) -> Self {
        Self {
            domain_id: Some(domain_id.into()),
            account_id: None,
        }
    }

    pub fn account(domain_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            domain_id: Some(domain_id.into()),
            account_id: Some(account_id.into()),
        }
    }

    pub fn is_global(&self) -> bool {
        self.domain_id.is_none() && self.account_id.is_none()
    }

    /// Whether a resource owned by `self` is visible to a caller acting in
    /// `requested`.
    ///
    /// Global resources and global callers see everything; otherwise the
    /// domains must agree and an account-owned resource is only visible to a
    /// domain-level caller or the same account.
    pub fn visible_from(&self, requested: &Scope) -> bool {
        if requested.is_global() || self.is_global() {
            return true;
        }
        if self.domain_id != requested.domain_id {
            return false;
        }
        match (&self.account_id, &requested.account_id) {
            (Some(owner), Some(caller)) => owner == caller,
            _ => true,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.domain_id, &self.account_id) {
            (None, None) => write!(f, "global"),
            (Some(d), None) => write!(f, "domain={}", d),
            (None, Some(a)) => write!(f, "account={}", a),
            (Some(d), Some(a)) => write!(f, "domain={} account={}", d, a),
        }
    }
}

/// A resource as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Platform-assigned identifier
    pub id: String,

    pub kind: ResourceKind,

    pub name: String,

    /// Parent resource (enclosing domain, owning network of a public IP, ...)
    pub parent_id: Option<String>,

    /// Zone the resource lives in, if zonal
    pub zone_id: Option<String>,

    pub scope: Scope,

    pub status: ResourceStatus,

    /// Kind-specific attributes (network type, ip address, port, ...)
    pub attributes: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl RemoteResource {
    pub fn new(id: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            parent_id: None,
            zone_id: None,
            scope: Scope::global(),
            status: ResourceStatus::Ready,
            attributes: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
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

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
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
}

/// Provisioning status of a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Still being provisioned asynchronously
    Creating,
    /// Usable
    Ready,
    /// Exists but stopped (machines)
    Stopped,
    /// Being torn down
    Deleting,
    /// Provisioning failed on the platform side
    Error,
}

impl ResourceStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, ResourceStatus::Ready | ResourceStatus::Stopped)
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Stopped => write!(f, "stopped"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_visibility() {
        let owned = Scope::account("d1", "a1");
        assert!(owned.visible_from(&Scope::global()));
        assert!(owned.visible_from(&Scope::domain("d1")));
        assert!(owned.visible_from(&Scope::account("d1", "a1")));
        assert!(!owned.visible_from(&Scope::domain("d2")));
        assert!(!owned.visible_from(&Scope::account("d1", "a2")));

        assert!(Scope::domain("d1").visible_from(&Scope::account("d1", "a2")));
        assert!(Scope::global().visible_from(&Scope::account("d1", "a1")));
    }

    #[test]
    fn test_resource_attributes() {
        let res = RemoteResource::new("n-1", ResourceKind::Network, "net1")
            .with_attribute("type", serde_json::json!("Isolated"))
            .with_status(ResourceStatus::Creating);

        assert_eq!(res.get_attribute::<String>("type").as_deref(), Some("Isolated"));
        assert_eq!(res.get_attribute::<u16>("type"), None);
        assert!(!res.status.is_settled());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::LoadBalancerRule.to_string(), "load-balancer-rule");
        assert_eq!(Scope::domain("d1").to_string(), "domain=d1");
    }
}
