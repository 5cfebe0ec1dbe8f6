mod common;

use common::*;
use proptest::prelude::*;
use stackflow_cloud::{MemoryCloud, Operation, RemoteResource, ResourceKind};
use stackflow_config::{DomainConfig, TagConfig};
use stackflow_core::PathResolver;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_path_resolution_is_idempotent(segments in prop::collection::vec("[a-z][a-z0-9]{0,6}", 1..5)) {
        prop_assume!(!segments[0].eq_ignore_ascii_case("root"));
        let cloud = MemoryCloud::new();
        cloud.seed(RemoteResource::new(ROOT_DOMAIN_ID, ResourceKind::Domain, "ROOT"));
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);
        let path = resolver.parse(&segments.join("/")).unwrap();

        let rt = runtime();
        let first = rt.block_on(resolver.resolve(&path, true)).unwrap();
        let creates = cloud.calls(Operation::Create);
        let second = rt.block_on(resolver.resolve(&path, true)).unwrap();

        prop_assert_eq!(creates, segments.len());
        prop_assert_eq!(cloud.calls(Operation::Create), creates);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.chain.len(), segments.len() + 1);
        prop_assert_eq!(first.chain[0].as_str(), ROOT_DOMAIN_ID);
        prop_assert_eq!(first.name.as_str(), segments.last().unwrap().as_str());
    }

    #[test]
    fn prop_root_prefix_names_same_domain(segments in prop::collection::vec("[a-z]{1,6}", 1..4)) {
        prop_assume!(!segments[0].eq_ignore_ascii_case("root"));
        let cloud = MemoryCloud::new();
        cloud.seed(RemoteResource::new(ROOT_DOMAIN_ID, ResourceKind::Domain, "ROOT"));
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let bare = resolver.parse(&segments.join("/")).unwrap();
        let prefixed = resolver.parse(&format!("ROOT/{}", segments.join("/"))).unwrap();
        prop_assert_eq!(&bare, &prefixed);

        let rt = runtime();
        let a = rt.block_on(resolver.resolve(&bare, true)).unwrap();
        let b = rt.block_on(resolver.resolve(&prefixed, true)).unwrap();
        prop_assert_eq!(a.id, b.id);
    }
}
