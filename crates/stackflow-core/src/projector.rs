//! Status projection
//!
//! The zone map is built by insertion and a second entry for the same zone
//! id is an error, never an overwrite.

use crate::error::{ResolveError, ResourceRef, Result};
use crate::model::{ClusterStatus, FailureDomain, ZoneStatus};
use crate::table::ResourceTable;
use stackflow_cloud::ResourceKind;
use std::collections::btree_map::Entry;

/// Remote ids outside the zone map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedIds {
    pub lb_rule_id: Option<String>,
    pub public_ip_id: Option<String>,
    pub domain_id: Option<String>,
}

pub struct StatusProjector<'a> {
    table: &'a ResourceTable,
}

impl<'a> StatusProjector<'a> {
    pub fn new(table: &'a ResourceTable) -> Self {
        Self { table }
    }

    /// Fold resolved failure domains into a fresh status
    ///
    /// Unresolved entries are carried in `failure_domains` but contribute no
    /// zone.
    pub fn project(&self, failure_domains: &[FailureDomain], ids: ProjectedIds) -> Result<ClusterStatus> {
        let mut status = ClusterStatus {
            failure_domains: failure_domains.to_vec(),
            lb_rule_id: ids.lb_rule_id,
            public_ip_id: ids.public_ip_id,
            domain_id: ids.domain_id,
            ..Default::default()
        };

        let mut owners: Vec<(&str, &str)> = Vec::new();
        for fd in failure_domains.iter().filter(|fd| fd.is_eligible()) {
            let zone_id = fd.zone_id.as_deref().unwrap_or_default();
            let target = || ResourceRef::new(ResourceKind::Zone, &fd.zone_name, fd.scope.clone());

            let zone = self.table.zone_status(zone_id).ok_or_else(|| {
                ResolveError::invariant(target(), format!("zone id {} missing from resource table", zone_id))
            })?;

            match status.zones.entry(zone_id.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(zone);
                    owners.push((zone_id, fd.name.as_str()));
                }
                Entry::Occupied(_) => {
                    let first = owners
                        .iter()
                        .find(|(id, _)| *id == zone_id)
                        .map(|(_, name)| *name)
                        .unwrap_or_default();
                    return Err(ResolveError::invariant(
                        target(),
                        format!(
                            "zone id {} reached by failure domains '{}' and '{}'",
                            zone_id, first, fd.name
                        ),
                    ));
                }
            }
        }

        Ok(status)
    }

    /// Zone status for one id
    pub fn zone(&self, zone_id: &str) -> Option<ZoneStatus> {
        self.table.zone_status(zone_id)
    }
}
