//! Typed resolver configuration
//!
//! Loaded once at process start and passed by reference into the core.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level resolver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub tags: TagConfig,
    pub domains: DomainConfig,
    pub accounts: AccountConfig,
    pub networks: NetworkConfig,
    pub endpoint: EndpointConfig,
    pub requeue: RequeueConfig,
}

/// Ownership tag names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagConfig {
    /// Tag written on every resource the resolver creates
    pub created_by_key: String,
    pub created_by_value: String,
    /// Prefix of the per-cluster usage tag; the cluster uid is appended
    pub cluster_key_prefix: String,
    pub cluster_value: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            created_by_key: "create_by_CAPC".to_string(),
            created_by_value: String::new(),
            cluster_key_prefix: "CAPC_cluster_".to_string(),
            cluster_value: "1".to_string(),
        }
    }
}

impl TagConfig {
    /// Usage tag key for one cluster
    pub fn cluster_key(&self, cluster_uid: &str) -> String {
        format!("{}{}", self.cluster_key_prefix, cluster_uid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DomainConfig {
    /// Name the platform gives its root domain
    pub root_name: String,
    /// Create missing path segments instead of failing
    pub allow_create: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            root_name: "ROOT".to_string(),
            allow_create: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    pub allow_create: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Create a missing isolated (or untyped) network
    pub create_isolated: bool,
    /// Offering used when creating isolated networks
    pub isolated_offering: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            create_isolated: true,
            isolated_offering: "DefaultIsolatedNetworkOfferingWithSourceNatService".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    /// API server port when the cluster spec leaves it unset
    pub default_port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self { default_port: 6443 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequeueConfig {
    /// Delay before re-checking a resource still provisioning
    pub pending_secs: u64,
    /// Delay after a transient platform failure
    pub unavailable_secs: u64,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            pending_secs: 5,
            unavailable_secs: 10,
        }
    }
}

impl RequeueConfig {
    pub fn pending(&self) -> Duration {
        Duration::from_secs(self.pending_secs)
    }

    pub fn unavailable(&self) -> Duration {
        Duration::from_secs(self.unavailable_secs)
    }
}

impl ResolverConfig {
    /// Parse and validate YAML text
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self> {
        let config: ResolverConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content, path)?;
        tracing::debug!("Loaded resolver config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tags.created_by_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "tags.created_by_key",
                reason: "must not be empty".to_string(),
            });
        }
        if self.tags.cluster_key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "tags.cluster_key_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.tags.cluster_key_prefix.starts_with(&self.tags.created_by_key)
            || self.tags.created_by_key.starts_with(&self.tags.cluster_key_prefix)
        {
            return Err(ConfigError::Invalid {
                field: "tags.cluster_key_prefix",
                reason: "must not overlap tags.created_by_key".to_string(),
            });
        }
        if self.domains.root_name.trim().is_empty() || self.domains.root_name.contains('/') {
            return Err(ConfigError::Invalid {
                field: "domains.root_name",
                reason: format!("'{}' is not a valid domain name", self.domains.root_name),
            });
        }
        if self.endpoint.default_port == 0 {
            return Err(ConfigError::Invalid {
                field: "endpoint.default_port",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.networks.create_isolated && self.networks.isolated_offering.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "networks.isolated_offering",
                reason: "required when networks.create_isolated is set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolverConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tags.cluster_key("0"), "CAPC_cluster_0");
        assert_eq!(config.tags.created_by_key, "create_by_CAPC");
        assert_eq!(config.requeue.pending(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "domains:\n  allow_create: false\nendpoint:\n  default_port: 8443\n";
        let config = ResolverConfig::from_yaml_str(yaml, Path::new("inline")).unwrap();

        assert!(!config.domains.allow_create);
        assert_eq!(config.domains.root_name, "ROOT");
        assert_eq!(config.endpoint.default_port, 8443);
        assert_eq!(config.tags, TagConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ResolverConfig::from_yaml_str("domain:\n  root_name: X\n", Path::new("inline"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ResolverConfig::default();
        config.tags.created_by_key = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tags.created_by_key", .. })
        ));

        let mut config = ResolverConfig::default();
        config.domains.root_name = "ROOT/x".to_string();
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.endpoint.default_port = 0;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.tags.cluster_key_prefix = "create_by_CAPC_x".to_string();
        assert!(config.validate().is_err());
    }
}
