//! Zones and their networks

use crate::error::{ResolveError, ResourceRef};
use serde::{Deserialize, Serialize};
use stackflow_cloud::ResourceKind;
use std::str::FromStr;

/// Guest network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    Shared,
    Isolated,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Shared => "Shared",
            NetworkType::Isolated => "Isolated",
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Ok(NetworkType::Shared),
            "isolated" => Ok(NetworkType::Isolated),
            other => Err(ResolveError::invalid(
                ResourceRef::global(ResourceKind::Network, other),
                format!("unsupported network type '{}'", s),
            )),
        }
    }
}

/// Desired network; name-only specs are allowed
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,
}

impl NetworkSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, network_type: NetworkType) -> Self {
        self.network_type = Some(network_type);
        self
    }

    /// Id when declared, else name
    pub fn identity(&self) -> &str {
        declared_id(&self.id).unwrap_or(self.name.as_str())
    }

    /// Whether two declarations certainly name different networks
    ///
    /// A name-only and an id-only declaration may be the same network; only
    /// resolution can tell.
    pub fn differs_from(&self, other: &NetworkSpec) -> bool {
        match (declared_id(&self.id), declared_id(&other.id)) {
            (Some(a), Some(b)) => a != b,
            _ => !self.name.is_empty() && !other.name.is_empty() && self.name != other.name,
        }
    }
}

fn declared_id(id: &Option<String>) -> Option<&str> {
    id.as_deref().filter(|i| !i.is_empty())
}

/// A resolved network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub network_type: NetworkType,
}

/// Desired zone with the network it carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub network: NetworkSpec,
}

impl ZoneSpec {
    pub fn new(name: impl Into<String>, network: NetworkSpec) -> Self {
        Self {
            name: name.into(),
            id: None,
            network,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Id when declared, else name
    pub fn identity(&self) -> &str {
        declared_id(&self.id).unwrap_or(self.name.as_str())
    }

    /// Whether two declarations certainly name the same zone
    pub fn same_zone(&self, other: &ZoneSpec) -> bool {
        let ids = matches!(
            (declared_id(&self.id), declared_id(&other.id)),
            (Some(a), Some(b)) if a == b
        );
        let names = !self.name.trim().is_empty() && self.name == other.name;
        ids || names
    }

    /// Name for display, falling back to the id
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            self.identity()
        } else {
            self.name.as_str()
        }
    }
}

/// A resolved zone; its network lives in the resource table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub id: String,
    pub network_id: String,
}
