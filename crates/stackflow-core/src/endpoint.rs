//! Control-plane endpoint
//!
//! Isolated networks need a public IP and a load-balancer rule in front of
//! the API servers. Shared networks are routed directly, so the caller has
//! to supply the host.

use crate::error::{ResolveError, ResourceRef, Result};
use crate::locator::{LocateQuery, ResourceLocator};
use crate::model::{Endpoint, Network, NetworkType};
use crate::outcome::ResolutionLog;
use serde_json::json;
use stackflow_cloud::{CreateSpec, RemoteResource, ResourceKind, Scope};
use stackflow_config::EndpointConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub public_ip_id: Option<String>,
    pub lb_rule_id: Option<String>,
    /// Public IP and rule as last read, for readiness checks
    pub resources: Vec<RemoteResource>,
}

impl ResolvedEndpoint {
    /// Whether every backing resource is usable
    pub fn is_settled(&self) -> bool {
        self.resources.iter().all(|r| r.status.is_settled())
    }
}

pub struct EndpointResolver<'a> {
    locator: &'a ResourceLocator<'a>,
    config: &'a EndpointConfig,
}

impl<'a> EndpointResolver<'a> {
    pub fn new(locator: &'a ResourceLocator<'a>, config: &'a EndpointConfig) -> Self {
        Self { locator, config }
    }

    /// Name of the API server load-balancer rule
    pub fn rule_name(cluster_name: &str) -> String {
        format!("{}-apiserver", cluster_name)
    }

    pub async fn resolve(
        &self,
        cluster_name: &str,
        requested: &Endpoint,
        network: &Network,
        zone_id: &str,
        scope: &Scope,
        log: &mut ResolutionLog,
    ) -> Result<ResolvedEndpoint> {
        let port = if requested.port == 0 {
            self.config.default_port
        } else {
            requested.port
        };
        let host = requested.host.trim();
        let rule_name = Self::rule_name(cluster_name);

        if network.network_type == NetworkType::Shared {
            if host.is_empty() {
                return Err(ResolveError::invalid(
                    ResourceRef::new(ResourceKind::LoadBalancerRule, &rule_name, scope.clone()),
                    format!("shared network '{}' needs an explicit endpoint host", network.name),
                ));
            }
            return Ok(ResolvedEndpoint {
                endpoint: Endpoint::new(host, port),
                public_ip_id: None,
                lb_rule_id: None,
                resources: Vec::new(),
            });
        }

        // Public IPs are named by address when the caller pinned one
        let ip_name = if host.is_empty() { rule_name.as_str() } else { host };
        let ip_query = LocateQuery::new(ResourceKind::PublicIp, ip_name)
            .with_scope(scope.clone())
            .with_parent(&network.id);
        let mut ip_spec = CreateSpec::new(ip_name)
            .with_parent(Some(network.id.as_str()))
            .with_zone(zone_id)
            .with_scope(scope.clone());
        if !host.is_empty() {
            ip_spec = ip_spec.with_attribute("address", json!(host));
        }

        let ip = self.locator.find_or_create(&ip_query, Some(&ip_spec)).await?;
        self.locator.claim(ResourceKind::PublicIp, &ip.id).await?;
        log.resolved(ResourceKind::PublicIp, ip_name, &ip.id, ip.created);

        let address = ip
            .resource
            .get_attribute::<String>("address")
            .unwrap_or_else(|| ip.resource.name.clone());
        if !host.is_empty() && address != host {
            return Err(ResolveError::invalid(
                ip_query.target(),
                format!("public ip {} has address {}", ip.id, address),
            ));
        }

        let rule_query = LocateQuery::new(ResourceKind::LoadBalancerRule, &rule_name)
            .with_scope(scope.clone())
            .with_parent(&ip.id);
        let rule_spec = CreateSpec::new(&rule_name)
            .with_parent(Some(ip.id.as_str()))
            .with_zone(zone_id)
            .with_scope(scope.clone())
            .with_attribute("public_port", json!(port))
            .with_attribute("private_port", json!(port))
            .with_attribute("algorithm", json!("roundrobin"));

        let rule = self.locator.find_or_create(&rule_query, Some(&rule_spec)).await?;
        self.locator.claim(ResourceKind::LoadBalancerRule, &rule.id).await?;
        log.resolved(ResourceKind::LoadBalancerRule, &rule_name, &rule.id, rule.created);

        tracing::debug!("Endpoint for {}: {}:{} via {}", cluster_name, address, port, rule.id);

        Ok(ResolvedEndpoint {
            endpoint: Endpoint::new(address, port),
            public_ip_id: Some(ip.id),
            lb_rule_id: Some(rule.id),
            resources: vec![ip.resource, rule.resource],
        })
    }
}
