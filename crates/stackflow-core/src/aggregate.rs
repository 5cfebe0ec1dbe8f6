//! Failure-domain set assembly

use crate::error::{ResolveError, ResourceRef, Result};
use crate::model::{FailureDomain, FailureDomainSpec, Network, Zone};
use stackflow_cloud::{ResourceKind, Scope};
use std::collections::HashSet;

pub struct AvailabilityAggregator<'a> {
    cluster_name: &'a str,
}

impl<'a> AvailabilityAggregator<'a> {
    pub fn new(cluster_name: &'a str) -> Self {
        Self { cluster_name }
    }

    /// Name of a failure domain; unnamed entries get `<cluster>-<zone>`
    ///
    /// Zones declared by id alone are labelled by id until resolved.
    pub fn name_for(&self, spec: &FailureDomainSpec) -> String {
        self.resolved_name(spec, spec.zone.label())
    }

    /// Name once the zone's platform name is known
    pub fn resolved_name(&self, spec: &FailureDomainSpec, zone_name: &str) -> String {
        match spec.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-{}", self.cluster_name, zone_name),
        }
    }

    /// First occurrence of every (zone, network) pair, in input order
    pub fn dedup<'s>(&self, specs: &'s [FailureDomainSpec]) -> Vec<&'s FailureDomainSpec> {
        let mut seen = HashSet::new();
        let mut firsts = Vec::new();
        for spec in specs {
            if seen.insert(spec.pair_key()) {
                firsts.push(spec);
            }
        }
        firsts
    }

    /// Reject a zone declared with two different networks
    ///
    /// Only declarations that certainly clash are caught here; the rest
    /// surface in [`admit`](Self::admit) once ids are known.
    pub fn check_consistency(&self, specs: &[FailureDomainSpec]) -> Result<()> {
        for (i, first) in specs.iter().enumerate() {
            for later in &specs[i + 1..] {
                let (a, b) = (&first.zone, &later.zone);
                if a.same_zone(b) && a.network.differs_from(&b.network) {
                    return Err(ResolveError::invalid(
                        ResourceRef::global(ResourceKind::Zone, a.label()),
                        format!(
                            "declared with networks '{}' and '{}'",
                            a.network.identity(),
                            b.network.identity()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Deduplicated, deterministically named failure domains
    ///
    /// Ids stay unset until zone resolution fills them in.
    pub fn build_failure_domains(&self, specs: &[FailureDomainSpec]) -> Vec<FailureDomain> {
        self.dedup(specs)
            .into_iter()
            .map(|spec| FailureDomain {
                name: self.name_for(spec),
                zone_name: spec.zone.name.clone(),
                network_name: spec.zone.network.name.clone(),
                zone_id: None,
                network_id: None,
                scope: Scope::global(),
            })
            .collect()
    }

    /// Whether a resolved pair joins the set next to `resolved`
    ///
    /// Returns false when an earlier entry already resolved to the same zone
    /// and network, which happens when one zone is declared by name and again
    /// by id. The same zone resolving to another network is `InvalidSpec`.
    pub fn admit(&self, resolved: &[FailureDomain], zone: &Zone, network: &Network) -> Result<bool> {
        for fd in resolved {
            if fd.zone_id.as_deref() != Some(zone.id.as_str()) {
                continue;
            }
            if fd.network_id.as_deref() == Some(network.id.as_str()) {
                return Ok(false);
            }
            return Err(ResolveError::invalid(
                ResourceRef::global(ResourceKind::Zone, &zone.name),
                format!(
                    "declared with networks '{}' and '{}'",
                    fd.network_name, network.name
                ),
            ));
        }
        Ok(true)
    }

    /// Entries ready for cluster assembly
    pub fn eligible<'f>(&self, failure_domains: &'f [FailureDomain]) -> Vec<&'f FailureDomain> {
        failure_domains.iter().filter(|fd| fd.is_eligible()).collect()
    }
}
