//! Per-pass table of resolved zones and networks
//!
//! Every zone and network is stored once, keyed by remote id. Failure
//! domains and status rows refer to entries by id.

use crate::error::{ResolveError, ResourceRef, Result};
use crate::model::{Network, Zone, ZoneStatus};
use stackflow_cloud::ResourceKind;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    zones: BTreeMap<String, Zone>,
    networks: BTreeMap<String, Network>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a network; re-inserting an identical entry is a no-op
    pub fn insert_network(&mut self, network: Network) -> Result<&Network> {
        if let Some(existing) = self.networks.get(&network.id) {
            if existing != &network {
                return Err(ResolveError::invariant(
                    ResourceRef::global(ResourceKind::Network, &network.name),
                    format!(
                        "network id {} already recorded as '{}'",
                        network.id, existing.name
                    ),
                ));
            }
        }
        let id = network.id.clone();
        Ok(self.networks.entry(id).or_insert(network))
    }

    /// Record a zone; its network must already be in the table
    pub fn insert_zone(&mut self, zone: Zone) -> Result<&Zone> {
        let target = || ResourceRef::global(ResourceKind::Zone, &zone.name);

        if !self.networks.contains_key(&zone.network_id) {
            return Err(ResolveError::invariant(
                target(),
                format!("network {} not recorded", zone.network_id),
            ));
        }
        if let Some(existing) = self.zones.get(&zone.id) {
            if existing != &zone {
                return Err(ResolveError::invariant(
                    target(),
                    format!(
                        "zone id {} already recorded with network {}",
                        zone.id, existing.network_id
                    ),
                ));
            }
        }
        let id = zone.id.clone();
        Ok(self.zones.entry(id).or_insert(zone))
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn network(&self, id: &str) -> Option<&Network> {
        self.networks.get(id)
    }

    pub fn zone_by_name(&self, name: &str) -> Option<&Zone> {
        self.zones.values().find(|z| z.name == name)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Status view of a zone, joined with its network
    pub fn zone_status(&self, id: &str) -> Option<ZoneStatus> {
        let zone = self.zones.get(id)?;
        let network = self.networks.get(&zone.network_id)?;
        Some(ZoneStatus {
            name: zone.name.clone(),
            id: zone.id.clone(),
            network: network.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::model::NetworkType;

    fn net(id: &str, name: &str) -> Network {
        Network {
            name: name.into(),
            id: id.into(),
            network_type: NetworkType::Shared,
        }
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut table = ResourceTable::new();
        table.insert_network(net("n-1", "net1")).unwrap();
        table.insert_network(net("n-1", "net1")).unwrap();

        let zone = Zone {
            name: "zoneA".into(),
            id: "z-1".into(),
            network_id: "n-1".into(),
        };
        table.insert_zone(zone.clone()).unwrap();
        table.insert_zone(zone).unwrap();

        assert_eq!(table.zones().count(), 1);
        let status = table.zone_status("z-1").unwrap();
        assert_eq!(status.network.name, "net1");
        assert_eq!(table.zone_by_name("zoneA").unwrap().id, "z-1");
    }

    #[test]
    fn test_conflicting_entries_rejected() {
        let mut table = ResourceTable::new();
        table.insert_network(net("n-1", "net1")).unwrap();
        table.insert_network(net("n-2", "net2")).unwrap();

        let err = table.insert_network(net("n-1", "other")).unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvariantViolation);

        table
            .insert_zone(Zone {
                name: "zoneA".into(),
                id: "z-1".into(),
                network_id: "n-1".into(),
            })
            .unwrap();
        let err = table
            .insert_zone(Zone {
                name: "zoneA".into(),
                id: "z-1".into(),
                network_id: "n-2".into(),
            })
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvariantViolation);
    }

    #[test]
    fn test_zone_requires_network() {
        let mut table = ResourceTable::new();
        let err = table
            .insert_zone(Zone {
                name: "zoneA".into(),
                id: "z-1".into(),
                network_id: "missing".into(),
            })
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvariantViolation);
    }
}
