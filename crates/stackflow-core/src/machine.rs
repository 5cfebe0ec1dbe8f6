//! Machine instances
//!
//! Templates, offerings and disk offerings are looked up, never created.
//! Placement comes from the cluster's resolved zones.

use crate::error::{ResolveError, ResourceRef, Result};
use crate::locator::{LocateQuery, ResourceLocator};
use crate::model::{
    ClusterStatus, Condition, ConditionKind, Machine, MachineSpec, ResourceIdentifier, ZoneStatus,
};
use crate::outcome::{NextStep, Resolution, ResolutionLog};
use serde_json::json;
use stackflow_cloud::{CreateSpec, RemoteResource, ResourceKind, ResourceStatus, Scope};
use stackflow_config::RequeueConfig;

/// Result of one machine pass
#[derive(Debug, Clone)]
pub struct MachineOutcome {
    pub machine: Option<Machine>,
    pub condition: Condition,
    pub log: ResolutionLog,
    pub next: NextStep,
    pub error: Option<ResolveError>,
}

pub struct MachineResolver<'a> {
    locator: &'a ResourceLocator<'a>,
    requeue: &'a RequeueConfig,
}

impl<'a> MachineResolver<'a> {
    pub fn new(locator: &'a ResourceLocator<'a>, requeue: &'a RequeueConfig) -> Self {
        Self { locator, requeue }
    }

    pub async fn reconcile_machine(
        &self,
        spec: &MachineSpec,
        cluster: &ClusterStatus,
        scope: &Scope,
    ) -> MachineOutcome {
        let mut log = ResolutionLog::new();
        let resolved = self.resolve(spec, cluster, scope, &mut log).await;

        let machine = match resolved {
            Ok(machine) if machine.status == ResourceStatus::Error => {
                let err = ResolveError::RemoteUnavailable {
                    target: ResourceRef::new(ResourceKind::Machine, &machine.name, scope.clone()),
                    message: format!("instance {} is in error state", machine.instance_id),
                };
                return self.failed(spec, Some(machine), err, log);
            }
            Ok(machine) => machine,
            Err(err) => return self.failed(spec, None, err, log),
        };

        if !machine.status.is_settled() {
            tracing::debug!("Machine {} is {}", machine.instance_id, machine.status);
            log.record(
                ResourceKind::Machine,
                &machine.name,
                Some(machine.instance_id.as_str()),
                Resolution::Pending,
            );
            return MachineOutcome {
                condition: Condition::pending(
                    ConditionKind::MachineReady,
                    format!("instance {} is {}", machine.instance_id, machine.status),
                ),
                machine: Some(machine),
                log,
                next: NextStep::RequeueAfter(self.requeue.pending()),
                error: None,
            };
        }

        MachineOutcome {
            condition: Condition::ok(
                ConditionKind::MachineReady,
                format!("instance {} in zone {}", machine.instance_id, machine.zone_id),
            ),
            machine: Some(machine),
            log,
            next: NextStep::Done,
            error: None,
        }
    }

    fn failed(
        &self,
        spec: &MachineSpec,
        machine: Option<Machine>,
        err: ResolveError,
        mut log: ResolutionLog,
    ) -> MachineOutcome {
        tracing::warn!("Machine {} failed: {}", spec.name, err);
        log.failed(&err);
        MachineOutcome {
            condition: Condition::failed(ConditionKind::MachineReady, &err),
            machine,
            log,
            next: NextStep::for_error(&err, self.requeue.unavailable()),
            error: Some(err),
        }
    }

    async fn resolve(
        &self,
        spec: &MachineSpec,
        cluster: &ClusterStatus,
        scope: &Scope,
        log: &mut ResolutionLog,
    ) -> Result<Machine> {
        if let Some(instance_id) = spec.instance_id.as_deref().filter(|i| !i.is_empty()) {
            let resource = self.locator.locate_by_id(ResourceKind::Machine, instance_id).await?;
            log.resolved(ResourceKind::Machine, &spec.name, instance_id, false);
            return Ok(to_machine(resource));
        }

        let zone = self.placement(spec, cluster, scope)?;
        let template = self.lookup(ResourceKind::Template, &spec.template).await?;
        let offering = self.lookup(ResourceKind::ServiceOffering, &spec.offering).await?;

        let mut create = CreateSpec::new(&spec.name)
            .with_zone(&zone.id)
            .with_scope(scope.clone())
            .with_attribute("template_id", json!(template.id))
            .with_attribute("offering_id", json!(offering.id))
            .with_attribute("network_id", json!(zone.network.id));

        if let Some(disk) = &spec.disk_offering {
            let found = self.lookup(ResourceKind::DiskOffering, &disk.offering).await?;
            create = create
                .with_attribute("disk_offering_id", json!(found.id))
                .with_attribute("disk", serde_json::to_value(disk).unwrap_or_default());
        }

        let mut group_ids = Vec::new();
        for name in &spec.affinity_groups {
            let id = cluster.affinity_groups.get(name).ok_or_else(|| {
                ResolveError::not_found(ResourceRef::new(ResourceKind::AffinityGroup, name, scope.clone()))
            })?;
            group_ids.push(id.clone());
        }
        if !group_ids.is_empty() {
            create = create.with_attribute("affinity_group_ids", json!(group_ids));
        }
        if !spec.details.is_empty() {
            create = create.with_attribute("details", json!(spec.details));
        }

        let query = LocateQuery::new(ResourceKind::Machine, &spec.name)
            .with_scope(scope.clone())
            .with_zone(&zone.id);
        let located = self.locator.find_or_create(&query, Some(&create)).await?;
        log.resolved(ResourceKind::Machine, &spec.name, &located.id, located.created);

        Ok(to_machine(located.resource))
    }

    /// Zone for the machine: its failure domain, else the cluster default
    fn placement<'c>(
        &self,
        spec: &MachineSpec,
        cluster: &'c ClusterStatus,
        scope: &Scope,
    ) -> Result<&'c ZoneStatus> {
        match spec.failure_domain.as_deref().filter(|f| !f.is_empty()) {
            Some(zone_id) => cluster.zones.get(zone_id).ok_or_else(|| {
                ResolveError::invalid(
                    ResourceRef::new(ResourceKind::Zone, zone_id, scope.clone()),
                    format!("machine '{}' names a zone the cluster does not use", spec.name),
                )
            }),
            None => cluster.default_zone().ok_or_else(|| {
                ResolveError::invalid(
                    ResourceRef::new(ResourceKind::Machine, &spec.name, scope.clone()),
                    "cluster has no resolved zones",
                )
            }),
        }
    }

    /// Look up a platform object by name and/or id without creating it
    async fn lookup(&self, kind: ResourceKind, ident: &ResourceIdentifier) -> Result<RemoteResource> {
        if ident.is_empty() {
            return Err(ResolveError::invalid(
                ResourceRef::global(kind, ident.label()),
                "name or id is required",
            ));
        }
        let query = LocateQuery::new(kind, ident.name.as_deref().unwrap_or_default())
            .with_id(ident.id.as_deref());
        let located = self.locator.find_or_create(&query, None).await?;
        Ok(located.resource)
    }

    /// Delete an instance created by this core
    ///
    /// Returns false when the instance is already gone.
    pub async fn delete_machine(&self, instance_id: &str) -> Result<bool> {
        match self.locator.locate_by_id(ResourceKind::Machine, instance_id).await {
            Ok(_) => {}
            Err(ResolveError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        self.locator
            .tags()
            .delete_if_owned(ResourceKind::Machine, instance_id)
            .await?;
        Ok(true)
    }
}

fn to_machine(resource: RemoteResource) -> Machine {
    Machine {
        address: resource.get_attribute::<String>("address"),
        zone_id: resource.zone_id.clone().unwrap_or_default(),
        instance_id: resource.id,
        name: resource.name,
        status: resource.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::model::{DiskOffering, Network, NetworkType};
    use stackflow_cloud::{MemoryCloud, Operation, TagSet};
    use stackflow_config::TagConfig;

    fn cloud() -> MemoryCloud {
        let cloud = MemoryCloud::new();
        cloud.seed(RemoteResource::new("FakeTemplateID", ResourceKind::Template, "ubuntu-22.04"));
        cloud.seed(RemoteResource::new("FakeOfferingID", ResourceKind::ServiceOffering, "Medium"));
        cloud.seed(RemoteResource::new("FakeDiskOfferingID", ResourceKind::DiskOffering, "Small"));
        cloud
    }

    fn status() -> ClusterStatus {
        let mut status = ClusterStatus::default();
        status.zones.insert(
            "FakeZone2ID".into(),
            ZoneStatus {
                name: "zone2".into(),
                id: "FakeZone2ID".into(),
                network: Network {
                    name: "SharedGuestNet2".into(),
                    id: "FakeSharedNetID2".into(),
                    network_type: NetworkType::Shared,
                },
            },
        );
        status
            .affinity_groups
            .insert("fakeaffinitygroup".into(), "FakeAffinityGroupID".into());
        status
    }

    fn spec() -> MachineSpec {
        MachineSpec {
            name: "test-machine".into(),
            template: ResourceIdentifier::named("ubuntu-22.04"),
            offering: ResourceIdentifier::by_id("FakeOfferingID"),
            disk_offering: Some(DiskOffering {
                offering: ResourceIdentifier::named("Small"),
                mount_path: "/data".into(),
                device: "/dev/vdb".into(),
                filesystem: "ext4".into(),
                label: "data_disk".into(),
                custom_size_gb: None,
            }),
            affinity_groups: vec!["fakeaffinitygroup".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_creates_machine_in_default_zone() {
        let cloud = cloud();
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let out = resolver.reconcile_machine(&spec(), &status(), &Scope::global()).await;
        assert_eq!(out.next, NextStep::Done);
        let machine = out.machine.unwrap();
        assert_eq!(machine.zone_id, "FakeZone2ID");
        assert!(out.condition.ok);

        let remote = cloud.get(&machine.instance_id).unwrap();
        assert_eq!(remote.get_attribute::<String>("template_id").as_deref(), Some("FakeTemplateID"));
        assert_eq!(remote.get_attribute::<String>("network_id").as_deref(), Some("FakeSharedNetID2"));
        assert_eq!(
            remote.get_attribute::<Vec<String>>("affinity_group_ids"),
            Some(vec!["FakeAffinityGroupID".to_string()])
        );
        assert!(cloud.tags_of(&machine.instance_id).contains_key("create_by_CAPC"));

        let again = resolver.reconcile_machine(&spec(), &status(), &Scope::global()).await;
        assert_eq!(again.machine.unwrap().instance_id, machine.instance_id);
        assert_eq!(cloud.calls(Operation::Create), 1);
    }

    #[tokio::test]
    async fn test_pending_machine_requeues() {
        let cloud = cloud();
        cloud.set_create_status(ResourceKind::Machine, ResourceStatus::Creating);
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let out = resolver.reconcile_machine(&spec(), &status(), &Scope::global()).await;
        assert_eq!(out.next, NextStep::RequeueAfter(requeue.pending()));
        assert!(!out.condition.ok);
        assert!(out.error.is_none());
        assert_eq!(out.log.summary().pending, 1);

        let id = out.machine.unwrap().instance_id;
        cloud.set_status(&id, ResourceStatus::Ready);
        let done = resolver.reconcile_machine(&spec(), &status(), &Scope::global()).await;
        assert_eq!(done.next, NextStep::Done);
    }

    #[tokio::test]
    async fn test_errored_machine_is_not_ready() {
        let cloud = cloud();
        cloud.set_create_status(ResourceKind::Machine, ResourceStatus::Error);
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let out = resolver.reconcile_machine(&spec(), &status(), &Scope::global()).await;
        assert!(!out.condition.ok);
        assert_eq!(out.condition.reason, Some(ErrorClass::RemoteUnavailable));
        assert_eq!(out.next, NextStep::RequeueAfter(requeue.unavailable()));
        assert_eq!(out.error.unwrap().target().kind, ResourceKind::Machine);
        assert_eq!(out.machine.unwrap().status, ResourceStatus::Error);
        assert_eq!(cloud.calls(Operation::Create), 1);
    }

    #[tokio::test]
    async fn test_deleting_machine_is_pending() {
        let cloud = cloud();
        cloud.seed(
            RemoteResource::new("FakeInstanceID", ResourceKind::Machine, "test-machine")
                .with_zone("FakeZone2ID")
                .with_status(ResourceStatus::Deleting),
        );
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let mut spec = spec();
        spec.instance_id = Some("FakeInstanceID".into());
        let out = resolver.reconcile_machine(&spec, &status(), &Scope::global()).await;
        assert!(out.error.is_none());
        assert!(!out.condition.ok);
        assert_eq!(out.next, NextStep::RequeueAfter(requeue.pending()));
    }

    #[tokio::test]
    async fn test_unknown_failure_domain_is_invalid() {
        let cloud = cloud();
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let mut spec = spec();
        spec.failure_domain = Some("OtherZoneID".into());
        let out = resolver.reconcile_machine(&spec, &status(), &Scope::global()).await;
        assert_eq!(out.error.unwrap().class(), ErrorClass::InvalidSpec);
        assert_eq!(out.next, NextStep::AwaitChange);
        assert_eq!(cloud.calls(Operation::Create), 0);
    }

    #[tokio::test]
    async fn test_missing_template_is_not_found() {
        let cloud = cloud();
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let mut spec = spec();
        spec.template = ResourceIdentifier::named("centos");
        let out = resolver.reconcile_machine(&spec, &status(), &Scope::global()).await;
        let err = out.error.unwrap();
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert_eq!(err.target().kind, ResourceKind::Template);
    }

    #[tokio::test]
    async fn test_existing_instance_id() {
        let cloud = cloud();
        cloud.seed(
            RemoteResource::new("FakeInstanceID", ResourceKind::Machine, "test-machine")
                .with_zone("FakeZone2ID"),
        );
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let mut spec = spec();
        spec.instance_id = Some("FakeInstanceID".into());
        let out = resolver.reconcile_machine(&spec, &status(), &Scope::global()).await;
        assert_eq!(out.machine.unwrap().zone_id, "FakeZone2ID");

        spec.instance_id = Some("GoneInstanceID".into());
        let out = resolver.reconcile_machine(&spec, &status(), &Scope::global()).await;
        assert_eq!(out.error.unwrap().class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn test_delete_machine_checks_ownership() {
        let cloud = cloud();
        cloud.seed(RemoteResource::new("external", ResourceKind::Machine, "pet"));
        cloud.seed_tagged(
            RemoteResource::new("owned", ResourceKind::Machine, "cattle"),
            TagSet::new().with("create_by_CAPC", ""),
        );
        let tags = TagConfig::default();
        let requeue = RequeueConfig::default();
        let locator = ResourceLocator::new(&cloud, &tags);
        let resolver = MachineResolver::new(&locator, &requeue);

        let err = resolver.delete_machine("external").await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::OwnershipConflict);
        assert!(resolver.delete_machine("owned").await.unwrap());
        assert!(!resolver.delete_machine("owned").await.unwrap());
    }
}
