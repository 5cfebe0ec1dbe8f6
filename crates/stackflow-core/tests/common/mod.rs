use async_trait::async_trait;
use serde_json::json;
use stackflow_cloud::{
    CreateSpec, MemoryCloud, RemoteResource, ResourceApi, ResourceFilter, ResourceKind, Result,
    TagSet,
};
use stackflow_core::{
    AffinityGroupSpec, AffinityType, ClusterSpec, DiskOffering, Endpoint, FailureDomainSpec,
    MachineSpec, NetworkSpec, NetworkType, ObjectContext, ResourceIdentifier, ZoneSpec,
};

pub const CLUSTER_NAME: &str = "test-cluster";
pub const CLUSTER_UID: &str = "0";
pub const ROOT_DOMAIN_ID: &str = "FakeRootDomainID";
pub const DOMAIN_NAME: &str = "FakeDomainName";
pub const LEVEL2_DOMAIN: &str = "foo/FakeDomainName";
pub const ACCOUNT_NAME: &str = "FakeAccountName";
pub const ZONE1_NAME: &str = "zone1";
pub const ZONE1_ID: &str = "FakeZone1ID";
pub const ZONE2_NAME: &str = "zone2";
pub const ZONE2_ID: &str = "FakeZone2ID";
pub const NET2_NAME: &str = "SharedGuestNet2";
pub const NET2_ID: &str = "FakeSharedNetID2";
pub const ISO_NET1_NAME: &str = "isoguestnet1";
pub const ENDPOINT_HOST: &str = "EndpointHost";
pub const ENDPOINT_PORT: u16 = 5309;
pub const AFFINITY_GROUP: &str = "fakeaffinitygroup";

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Platform with the root domain, two zones, a shared network in zone2 and
/// the offerings machines use
pub fn platform() -> MemoryCloud {
    let cloud = MemoryCloud::new();
    seed_platform(&cloud);
    cloud
}

pub fn seed_platform(cloud: &MemoryCloud) {
    cloud.seed(RemoteResource::new(ROOT_DOMAIN_ID, ResourceKind::Domain, "ROOT"));
    cloud.seed(RemoteResource::new(ZONE1_ID, ResourceKind::Zone, ZONE1_NAME));
    cloud.seed(RemoteResource::new(ZONE2_ID, ResourceKind::Zone, ZONE2_NAME));
    cloud.seed(
        RemoteResource::new(NET2_ID, ResourceKind::Network, NET2_NAME)
            .with_zone(ZONE2_ID)
            .with_attribute("type", json!("Shared")),
    );
    cloud.seed(RemoteResource::new("FakeTemplateID", ResourceKind::Template, "ubuntu-22.04"));
    cloud.seed(RemoteResource::new("FakeOfferingID", ResourceKind::ServiceOffering, "Medium"));
    cloud.seed(RemoteResource::new("FakeDiskOfferingID", ResourceKind::DiskOffering, "Small"));
}

pub fn shared_failure_domain() -> FailureDomainSpec {
    FailureDomainSpec::new(
        ZoneSpec::new(
            ZONE2_NAME,
            NetworkSpec::named(NET2_NAME)
                .with_id(NET2_ID)
                .with_type(NetworkType::Shared),
        )
        .with_id(ZONE2_ID),
    )
}

pub fn isolated_failure_domain() -> FailureDomainSpec {
    FailureDomainSpec::new(ZoneSpec::new(ZONE1_NAME, NetworkSpec::named(ISO_NET1_NAME)))
}

/// Cluster on the shared network with a pinned endpoint
pub fn shared_cluster() -> ClusterSpec {
    ClusterSpec {
        context: ObjectContext {
            uid: CLUSTER_UID.into(),
            namespace: "default".into(),
            name: CLUSTER_NAME.into(),
        },
        name: CLUSTER_NAME.into(),
        failure_domains: vec![shared_failure_domain()],
        control_plane_endpoint: Endpoint::new(ENDPOINT_HOST, ENDPOINT_PORT),
        ..Default::default()
    }
}

/// Cluster on an isolated network the resolver has to create
pub fn isolated_cluster() -> ClusterSpec {
    ClusterSpec {
        failure_domains: vec![isolated_failure_domain()],
        control_plane_endpoint: Endpoint::default(),
        ..shared_cluster()
    }
}

#[allow(dead_code)]
pub fn cluster_named(name: &str, uid: &str, base: ClusterSpec) -> ClusterSpec {
    ClusterSpec {
        context: ObjectContext {
            uid: uid.into(),
            namespace: "default".into(),
            name: name.into(),
        },
        name: name.into(),
        ..base
    }
}

#[allow(dead_code)]
pub fn anti_affinity() -> AffinityGroupSpec {
    AffinityGroupSpec {
        name: AFFINITY_GROUP.into(),
        group_type: AffinityType::AntiAffinity,
        id: None,
    }
}

#[allow(dead_code)]
pub fn machine() -> MachineSpec {
    MachineSpec {
        context: ObjectContext {
            uid: "machine-uid".into(),
            namespace: "default".into(),
            name: "test-machine".into(),
        },
        name: "test-machine".into(),
        template: ResourceIdentifier::named("ubuntu-22.04"),
        offering: ResourceIdentifier::named("Medium"),
        disk_offering: Some(DiskOffering {
            offering: ResourceIdentifier::named("Small"),
            mount_path: "/data".into(),
            device: "/dev/vdb".into(),
            filesystem: "ext4".into(),
            label: "data_disk".into(),
            custom_size_gb: None,
        }),
        ..Default::default()
    }
}

/// Backend that yields to the scheduler before every call, so concurrent
/// passes interleave their remote calls
#[allow(dead_code)]
pub struct YieldingCloud {
    pub inner: MemoryCloud,
}

#[async_trait]
impl ResourceApi for YieldingCloud {
    fn name(&self) -> &str {
        "yielding"
    }

    async fn list(&self, kind: ResourceKind, filter: &ResourceFilter) -> Result<Vec<RemoteResource>> {
        tokio::task::yield_now().await;
        self.inner.list(kind, filter).await
    }

    async fn create(&self, kind: ResourceKind, spec: &CreateSpec) -> Result<RemoteResource> {
        tokio::task::yield_now().await;
        self.inner.create(kind, spec).await
    }

    async fn tag(&self, resource_id: &str, tags: &TagSet) -> Result<()> {
        tokio::task::yield_now().await;
        self.inner.tag(resource_id, tags).await
    }

    async fn untag(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        tokio::task::yield_now().await;
        self.inner.untag(resource_id, keys).await
    }

    async fn list_tags(&self, resource_id: &str) -> Result<TagSet> {
        tokio::task::yield_now().await;
        self.inner.list_tags(resource_id).await
    }

    async fn delete(&self, resource_id: &str) -> Result<()> {
        tokio::task::yield_now().await;
        self.inner.delete(resource_id).await
    }
}
