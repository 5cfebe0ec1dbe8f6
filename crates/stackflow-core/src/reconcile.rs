//! Cluster reconcile pass
//!
//! One pass walks the dependency order: domain and account, zones and
//! networks per failure domain, the failure-domain set, the control-plane
//! endpoint, affinity groups, then status. The pass stops at the first
//! failure but still projects whatever it resolved before that.

use crate::aggregate::AvailabilityAggregator;
use crate::endpoint::{EndpointResolver, ResolvedEndpoint};
use crate::error::{ResolveError, ResourceRef, Result};
use crate::locator::{LocateQuery, ResourceLocator};
use crate::machine::{MachineOutcome, MachineResolver};
use crate::model::{
    Account, ClusterSpec, ClusterStatus, Condition, ConditionKind, Domain, DomainPath,
    FailureDomain, MachineSpec, Network, NetworkSpec, NetworkType, Zone, ZoneSpec,
};
use crate::outcome::{NextStep, Resolution, ResolutionLog};
use crate::path::PathResolver;
use crate::projector::{ProjectedIds, StatusProjector};
use crate::table::ResourceTable;
use serde_json::json;
use stackflow_cloud::{CreateSpec, RemoteResource, ResourceApi, ResourceKind, Scope};
use stackflow_config::ResolverConfig;
use std::collections::{BTreeMap, HashMap};

/// Domains and accounts resolved for one cluster
///
/// Owned by the caller and dropped with the cluster. Cached entries are
/// re-validated by id on every pass; the path is never walked again.
#[derive(Debug, Clone, Default)]
pub struct ClusterCache {
    domains: HashMap<DomainPath, Domain>,
    accounts: HashMap<(DomainPath, String), Account>,
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(&self, path: &DomainPath) -> Option<&Domain> {
        self.domains.get(path)
    }

    pub fn account(&self, path: &DomainPath, name: &str) -> Option<&Account> {
        self.accounts.get(&(path.clone(), name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.accounts.is_empty()
    }

    fn forget(&mut self, path: &DomainPath) {
        self.domains.remove(path);
        self.accounts.retain(|(p, _), _| p != path);
    }
}

/// Result of one cluster pass
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub status: ClusterStatus,
    pub log: ResolutionLog,
    pub next: NextStep,
    pub error: Option<ResolveError>,
}

/// Scope the cluster's resources live in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ResolvedScope {
    scope: Scope,
    domain_id: Option<String>,
}

/// Working state of a pass
struct Pass {
    stage: ConditionKind,
    log: ResolutionLog,
    table: ResourceTable,
    failure_domains: Vec<FailureDomain>,
    domain_id: Option<String>,
    endpoint: Option<ResolvedEndpoint>,
    affinity_groups: BTreeMap<String, String>,
    conditions: Vec<Condition>,
    pending: Vec<String>,
}

impl Pass {
    fn new() -> Self {
        Self {
            stage: ConditionKind::DomainResolved,
            log: ResolutionLog::new(),
            table: ResourceTable::new(),
            failure_domains: Vec::new(),
            domain_id: None,
            endpoint: None,
            affinity_groups: BTreeMap::new(),
            conditions: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Note a resource that exists but is not usable yet
    fn watch(&mut self, resource: &RemoteResource) {
        if !resource.status.is_settled() {
            self.log.record(
                resource.kind,
                resource.name.clone(),
                Some(resource.id.as_str()),
                Resolution::Pending,
            );
            self.pending.push(format!("{} {}", resource.kind, resource.name));
        }
    }

    fn project(&self) -> Result<ClusterStatus> {
        let ids = ProjectedIds {
            lb_rule_id: self.endpoint.as_ref().and_then(|e| e.lb_rule_id.clone()),
            public_ip_id: self.endpoint.as_ref().and_then(|e| e.public_ip_id.clone()),
            domain_id: self.domain_id.clone(),
        };
        let mut status = StatusProjector::new(&self.table).project(&self.failure_domains, ids)?;
        status.endpoint = self.endpoint.as_ref().map(|e| e.endpoint.clone());
        status.affinity_groups = self.affinity_groups.clone();
        Ok(status)
    }
}

pub struct ClusterReconciler<'a> {
    api: &'a dyn ResourceApi,
    config: &'a ResolverConfig,
}

impl<'a> ClusterReconciler<'a> {
    pub fn new(api: &'a dyn ResourceApi, config: &'a ResolverConfig) -> Self {
        Self { api, config }
    }

    fn locator<'s>(&'s self, spec: &'s ClusterSpec) -> ResourceLocator<'s> {
        ResourceLocator::new(self.api, &self.config.tags)
            .for_cluster(&spec.context.uid)
            .with_tags(spec.tags.clone())
    }

    fn paths(&self) -> PathResolver<'a> {
        PathResolver::new(self.api, &self.config.tags, &self.config.domains)
    }

    /// Run one pass for `spec`
    pub async fn reconcile(&self, spec: &ClusterSpec, cache: &mut ClusterCache) -> ReconcileOutcome {
        tracing::debug!("Reconciling cluster {} via {}", spec.name, self.api.name());

        let mut pass = Pass::new();
        let result = self.run(spec, cache, &mut pass).await;
        self.finish(spec, pass, result)
    }

    /// Project the pass into status and decide what happens next
    fn finish(&self, spec: &ClusterSpec, mut pass: Pass, result: Result<()>) -> ReconcileOutcome {
        let (mut status, error) = match result.and_then(|()| pass.project()) {
            Ok(status) => (status, None),
            Err(err) => {
                let status = pass.project().unwrap_or_else(|_| ClusterStatus {
                    failure_domains: pass.failure_domains.clone(),
                    domain_id: pass.domain_id.clone(),
                    ..Default::default()
                });
                (status, Some(err))
            }
        };

        for condition in pass.conditions.drain(..) {
            status.set_condition(condition);
        }
        if let Some(err) = &error {
            tracing::warn!("Cluster {} blocked at {:?}: {}", spec.name, pass.stage, err);
            pass.log.failed(err);
            status.set_condition(Condition::failed(pass.stage, err));
        }

        let next = match &error {
            Some(err) => NextStep::for_error(err, self.config.requeue.unavailable()),
            None if !pass.pending.is_empty() => NextStep::RequeueAfter(self.config.requeue.pending()),
            None => NextStep::Done,
        };
        status.ready = next == NextStep::Done;

        tracing::info!("Cluster {}: {}", spec.name, pass.log.summary());

        ReconcileOutcome {
            status,
            log: pass.log,
            next,
            error,
        }
    }

    async fn run(&self, spec: &ClusterSpec, cache: &mut ClusterCache, pass: &mut Pass) -> Result<()> {
        let aggregator = AvailabilityAggregator::new(&spec.name);
        self.validate(spec, &aggregator)?;

        let paths = self.paths();
        let locator = self.locator(spec);

        // Domain and account
        let cluster_scope = self
            .resolve_scope(&paths, spec.domain.as_deref(), spec.account.as_deref(), cache, &mut pass.log)
            .await?;
        pass.domain_id = cluster_scope.domain_id.clone();
        pass.conditions.push(Condition::ok(
            ConditionKind::DomainResolved,
            format!("resolved in {}", cluster_scope.scope),
        ));

        // Zones and networks
        pass.stage = ConditionKind::FailureDomainsReady;
        let firsts = aggregator.dedup(&spec.failure_domains);
        pass.failure_domains = aggregator.build_failure_domains(&spec.failure_domains);

        // Entries before `at` are resolved; the rest are still as declared
        let mut at = 0;
        for fd_spec in firsts {
            let domain = fd_spec.domain.as_deref().or(spec.domain.as_deref());
            let account = fd_spec.account.as_deref().or(spec.account.as_deref());
            let scope = if fd_spec.domain.is_none() && fd_spec.account.is_none() {
                cluster_scope.clone()
            } else {
                self.resolve_scope(&paths, domain, account, cache, &mut pass.log).await?
            };

            let (zone, network) = self
                .resolve_zone(&locator, &fd_spec.zone, &scope.scope, pass, at)
                .await?;
            if !aggregator.admit(&pass.failure_domains[..at], &zone, &network)? {
                tracing::debug!(
                    "Failure domain {} repeats zone {} on network {}",
                    aggregator.name_for(fd_spec),
                    zone.id,
                    network.id
                );
                pass.failure_domains.remove(at);
                continue;
            }

            pass.table.insert_network(network.clone())?;
            pass.table.insert_zone(zone.clone())?;
            if let Some(fd) = pass.failure_domains.get_mut(at) {
                fd.name = aggregator.resolved_name(fd_spec, &zone.name);
                fd.zone_name = zone.name;
                fd.zone_id = Some(zone.id);
                fd.network_name = network.name;
                fd.network_id = Some(network.id);
                fd.scope = scope.scope;
            }
            at += 1;
        }

        let ready = aggregator.eligible(&pass.failure_domains).len();
        pass.conditions.push(if pass.pending.is_empty() {
            Condition::ok(
                ConditionKind::FailureDomainsReady,
                format!("{} failure domain(s) ready", ready),
            )
        } else {
            Condition::pending(
                ConditionKind::FailureDomainsReady,
                format!("waiting for {}", pass.pending.join(", ")),
            )
        });

        // Control-plane endpoint in the first failure domain
        pass.stage = ConditionKind::EndpointReady;
        let (zone_id, network) = self.primary_network(pass)?;
        let endpoint = EndpointResolver::new(&locator, &self.config.endpoint)
            .resolve(
                &spec.name,
                &spec.control_plane_endpoint,
                &network,
                &zone_id,
                &cluster_scope.scope,
                &mut pass.log,
            )
            .await?;
        let waiting = pass.pending.len();
        for resource in &endpoint.resources {
            pass.watch(resource);
        }
        pass.conditions.push(if pass.pending.len() == waiting {
            Condition::ok(
                ConditionKind::EndpointReady,
                format!("{}:{}", endpoint.endpoint.host, endpoint.endpoint.port),
            )
        } else {
            Condition::pending(
                ConditionKind::EndpointReady,
                format!("waiting for {}", pass.pending[waiting..].join(", ")),
            )
        });
        pass.endpoint = Some(endpoint);

        // Affinity groups
        if !spec.affinity_groups.is_empty() {
            pass.stage = ConditionKind::AffinityGroupsReady;
            let waiting = pass.pending.len();
            for group in &spec.affinity_groups {
                let query = LocateQuery::new(ResourceKind::AffinityGroup, &group.name)
                    .with_id(group.id.as_deref())
                    .with_scope(cluster_scope.scope.clone());
                let create = CreateSpec::new(&group.name)
                    .with_scope(cluster_scope.scope.clone())
                    .with_attribute("type", json!(group.group_type.as_str()));

                let located = locator.find_or_create(&query, Some(&create)).await?;
                if let Some(actual) = located.resource.get_attribute::<String>("type") {
                    if actual != group.group_type.as_str() {
                        return Err(ResolveError::invalid(
                            query.target(),
                            format!("existing group has type '{}'", actual),
                        ));
                    }
                }
                locator.claim(ResourceKind::AffinityGroup, &located.id).await?;
                pass.log.resolved(ResourceKind::AffinityGroup, &group.name, &located.id, located.created);
                pass.watch(&located.resource);
                pass.affinity_groups.insert(group.name.clone(), located.id);
            }
            pass.conditions.push(if pass.pending.len() == waiting {
                Condition::ok(
                    ConditionKind::AffinityGroupsReady,
                    format!("{} group(s)", pass.affinity_groups.len()),
                )
            } else {
                Condition::pending(
                    ConditionKind::AffinityGroupsReady,
                    format!("waiting for {}", pass.pending[waiting..].join(", ")),
                )
            });
        }

        // Projection itself runs in reconcile() so partial progress is kept
        pass.stage = ConditionKind::StatusProjected;
        Ok(())
    }

    fn validate(&self, spec: &ClusterSpec, aggregator: &AvailabilityAggregator<'_>) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(ResolveError::invalid(
                ResourceRef::global(ResourceKind::Zone, &spec.name),
                "cluster name is empty",
            ));
        }
        if spec.failure_domains.is_empty() {
            return Err(ResolveError::invalid(
                ResourceRef::global(ResourceKind::Zone, &spec.name),
                "at least one failure domain is required",
            ));
        }
        for fd in &spec.failure_domains {
            if fd.zone.name.trim().is_empty() && fd.zone.id.as_deref().unwrap_or("").is_empty() {
                return Err(ResolveError::invalid(
                    ResourceRef::global(ResourceKind::Zone, aggregator.name_for(fd)),
                    "zone needs a name or an id",
                ));
            }
            if fd.zone.network.name.trim().is_empty()
                && fd.zone.network.id.as_deref().unwrap_or("").is_empty()
            {
                return Err(ResolveError::invalid(
                    ResourceRef::global(ResourceKind::Network, &fd.zone.name),
                    "network needs a name or an id",
                ));
            }
        }
        aggregator.check_consistency(&spec.failure_domains)
    }

    /// Domain and account for a (domain path, account) pair, from the cache
    /// when possible
    async fn resolve_scope(
        &self,
        paths: &PathResolver<'_>,
        domain: Option<&str>,
        account: Option<&str>,
        cache: &mut ClusterCache,
        log: &mut ResolutionLog,
    ) -> Result<ResolvedScope> {
        let raw = domain.map(str::trim).filter(|d| !d.is_empty());
        let account = account.map(str::trim).filter(|a| !a.is_empty());
        if raw.is_none() && account.is_none() {
            return Ok(ResolvedScope::default());
        }

        let path = paths.parse(raw.unwrap_or_default())?;
        let domain = self.cached_domain(paths, &path, cache, log).await?;

        let Some(name) = account else {
            return Ok(ResolvedScope {
                scope: domain.scope(),
                domain_id: Some(domain.id),
            });
        };

        let key = (path.clone(), name.to_string());
        let account = match cache.accounts.get(&key).cloned() {
            Some(cached) => match paths.revalidate_account(&cached).await {
                Ok(account) => {
                    log.resolved(ResourceKind::Account, name, account.id(), false);
                    account
                }
                Err(err) => {
                    cache.accounts.remove(&key);
                    return Err(err);
                }
            },
            None => {
                let account = paths
                    .resolve_account(&domain, name, self.config.accounts.allow_create, log)
                    .await?;
                cache.accounts.insert(key, account.clone());
                account
            }
        };

        Ok(ResolvedScope {
            scope: account.scope(),
            domain_id: Some(domain.id),
        })
    }

    async fn cached_domain(
        &self,
        paths: &PathResolver<'_>,
        path: &DomainPath,
        cache: &mut ClusterCache,
        log: &mut ResolutionLog,
    ) -> Result<Domain> {
        if let Some(cached) = cache.domains.get(path).cloned() {
            return match paths.revalidate(&cached).await {
                Ok(domain) => {
                    log.resolved(ResourceKind::Domain, &domain.name, &domain.id, false);
                    Ok(domain)
                }
                Err(err) => {
                    tracing::warn!("Cached domain '{}' ({}) is stale: {}", path, cached.id, err);
                    cache.forget(path);
                    Err(err)
                }
            };
        }

        let domain = paths
            .resolve_logged(path, self.config.domains.allow_create, log)
            .await?;
        cache.domains.insert(path.clone(), domain.clone());
        Ok(domain)
    }

    /// Resolve a zone (never created) and its network
    ///
    /// Nothing is recorded in the pass table until the pair is admitted. A
    /// zone already placed by one of the first `placed` failure domains
    /// never gets a second network created.
    async fn resolve_zone(
        &self,
        locator: &ResourceLocator<'_>,
        spec: &ZoneSpec,
        scope: &Scope,
        pass: &mut Pass,
        placed: usize,
    ) -> Result<(Zone, Network)> {
        let zone_query = LocateQuery::new(ResourceKind::Zone, &spec.name).with_id(spec.id.as_deref());
        let zone = locator.find_or_create(&zone_query, None).await?;
        pass.log.resolved(ResourceKind::Zone, &zone.resource.name, &zone.id, false);

        let earlier = pass.failure_domains[..placed]
            .iter()
            .find(|fd| fd.zone_id.as_deref() == Some(zone.id.as_str()))
            .map(|fd| fd.network_name.clone());
        let result = self
            .resolve_network(locator, &spec.network, &zone.id, scope, earlier.is_none(), pass)
            .await;
        let network = match (result, earlier) {
            (Err(ResolveError::NotFound { .. }), Some(earlier)) => {
                return Err(ResolveError::invalid(
                    ResourceRef::global(ResourceKind::Zone, &zone.resource.name),
                    format!(
                        "declared with networks '{}' and '{}'",
                        earlier,
                        spec.network.identity()
                    ),
                ));
            }
            (result, _) => result?,
        };

        let resolved = Zone {
            name: zone.resource.name,
            id: zone.id,
            network_id: network.id.clone(),
        };
        Ok((resolved, network))
    }

    async fn resolve_network(
        &self,
        locator: &ResourceLocator<'_>,
        spec: &NetworkSpec,
        zone_id: &str,
        scope: &Scope,
        allow_create: bool,
        pass: &mut Pass,
    ) -> Result<Network> {
        let query = LocateQuery::new(ResourceKind::Network, &spec.name)
            .with_id(spec.id.as_deref())
            .with_scope(scope.clone())
            .with_zone(zone_id);

        let creatable = allow_create
            && spec.network_type != Some(NetworkType::Shared)
            && self.config.networks.create_isolated;
        let create = creatable.then(|| {
            CreateSpec::new(&spec.name)
                .with_zone(zone_id)
                .with_scope(scope.clone())
                .with_attribute("type", json!(NetworkType::Isolated.as_str()))
                .with_attribute("offering", json!(self.config.networks.isolated_offering))
        });

        let located = locator.find_or_create(&query, create.as_ref()).await?;
        pass.log.resolved(ResourceKind::Network, &located.resource.name, &located.id, located.created);
        pass.watch(&located.resource);

        let remote_type = match located.resource.get_attribute::<String>("type") {
            Some(raw) => Some(raw.parse::<NetworkType>()?),
            None => None,
        };
        if let (Some(wanted), Some(actual)) = (spec.network_type, remote_type) {
            if wanted != actual {
                return Err(ResolveError::invalid(
                    query.target(),
                    format!("declared {} but the platform reports {}", wanted, actual),
                ));
            }
        }
        let network_type = remote_type.or(spec.network_type).unwrap_or(NetworkType::Shared);

        if network_type == NetworkType::Isolated {
            locator.claim(ResourceKind::Network, &located.id).await?;
        }

        Ok(Network {
            name: located.resource.name,
            id: located.id,
            network_type,
        })
    }

    fn primary_network(&self, pass: &Pass) -> Result<(String, Network)> {
        let missing = |name: &str| {
            ResolveError::invariant(
                ResourceRef::global(ResourceKind::Network, name),
                "first failure domain has no resolved network",
            )
        };
        let first = pass.failure_domains.first().ok_or_else(|| missing(""))?;
        let zone_id = first.zone_id.clone().ok_or_else(|| missing(&first.network_name))?;
        let network = first
            .network_id
            .as_deref()
            .and_then(|id| pass.table.network(id))
            .cloned()
            .ok_or_else(|| missing(&first.network_name))?;
        Ok((zone_id, network))
    }

    /// Scope the cluster resolves in, from the cache when possible
    pub async fn cluster_scope(&self, spec: &ClusterSpec, cache: &mut ClusterCache) -> Result<Scope> {
        let mut log = ResolutionLog::new();
        let resolved = self
            .resolve_scope(&self.paths(), spec.domain.as_deref(), spec.account.as_deref(), cache, &mut log)
            .await?;
        Ok(resolved.scope)
    }

    /// Run one pass for a machine of the cluster
    pub async fn reconcile_machine(
        &self,
        machine: &MachineSpec,
        spec: &ClusterSpec,
        status: &ClusterStatus,
        cache: &mut ClusterCache,
    ) -> MachineOutcome {
        let locator = self.locator(spec);
        let resolver = MachineResolver::new(&locator, &self.config.requeue);

        match self.cluster_scope(spec, cache).await {
            Ok(scope) => resolver.reconcile_machine(machine, status, &scope).await,
            Err(err) => {
                let mut log = ResolutionLog::new();
                log.failed(&err);
                MachineOutcome {
                    machine: None,
                    condition: Condition::failed(ConditionKind::MachineReady, &err),
                    log,
                    next: NextStep::for_error(&err, self.config.requeue.unavailable()),
                    error: Some(err),
                }
            }
        }
    }

    /// Delete a machine instance created for the cluster
    pub async fn delete_machine(&self, spec: &ClusterSpec, instance_id: &str) -> Result<bool> {
        let locator = self.locator(spec);
        MachineResolver::new(&locator, &self.config.requeue)
            .delete_machine(instance_id)
            .await
    }

    /// Release what this cluster created
    ///
    /// Load-balancer rule, public IP, affinity groups and isolated networks
    /// are released in that order. Each is deleted only when it carries the
    /// creator marker and no other cluster still uses it. Domains, accounts
    /// and zones are left alone.
    pub async fn delete(&self, spec: &ClusterSpec, status: &ClusterStatus) -> Result<ResolutionLog> {
        let locator = self.locator(spec);
        let tags = locator.tags();
        let uid = spec.context.uid.as_str();
        let mut log = ResolutionLog::new();

        let mut targets: Vec<(ResourceKind, String, String)> = Vec::new();
        if let Some(id) = &status.lb_rule_id {
            targets.push((ResourceKind::LoadBalancerRule, EndpointResolver::rule_name(&spec.name), id.clone()));
        }
        if let Some(id) = &status.public_ip_id {
            let host = spec.control_plane_endpoint.host.trim();
            let name = if host.is_empty() {
                EndpointResolver::rule_name(&spec.name)
            } else {
                host.to_string()
            };
            targets.push((ResourceKind::PublicIp, name, id.clone()));
        }
        for (name, id) in &status.affinity_groups {
            targets.push((ResourceKind::AffinityGroup, name.clone(), id.clone()));
        }
        for zone in status.zones.values() {
            let network = &zone.network;
            let seen = targets.iter().any(|(_, _, id)| *id == network.id);
            if network.network_type == NetworkType::Isolated && !seen {
                targets.push((ResourceKind::Network, network.name.clone(), network.id.clone()));
            }
        }

        for (kind, name, id) in targets {
            if tags.release(kind, &id, uid).await? {
                log.record(kind, name, Some(id.as_str()), Resolution::Deleted);
            }
        }

        tracing::info!("Cluster {} released: {}", spec.name, log.summary());
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use stackflow_cloud::MemoryCloud;

    #[test]
    fn test_projection_failure_has_its_own_condition() {
        let cloud = MemoryCloud::new();
        let config = ResolverConfig::default();
        let reconciler = ClusterReconciler::new(&cloud, &config);
        let spec = ClusterSpec {
            name: "test-cluster".into(),
            ..Default::default()
        };

        // A failure domain pointing at a zone the table never saw
        let mut pass = Pass::new();
        pass.stage = ConditionKind::StatusProjected;
        pass.failure_domains.push(FailureDomain {
            name: "test-cluster-zone2".into(),
            zone_name: "zone2".into(),
            network_name: "SharedGuestNet2".into(),
            zone_id: Some("FakeZone2ID".into()),
            network_id: Some("FakeSharedNetID2".into()),
            scope: Scope::global(),
        });

        let outcome = reconciler.finish(&spec, pass, Ok(()));
        assert_eq!(outcome.error.unwrap().class(), ErrorClass::InvariantViolation);
        assert_eq!(outcome.next, NextStep::AwaitChange);
        assert!(!outcome.status.ready);

        let condition = outcome.status.condition(ConditionKind::StatusProjected).unwrap();
        assert!(!condition.ok);
        assert!(outcome.status.condition(ConditionKind::FailureDomainsReady).is_none());
        assert_eq!(outcome.status.failure_domains.len(), 1);
    }
}
