//! Domain path resolution
//!
//! A path is walked from the platform root one segment at a time, each
//! segment looked up by name under the domain resolved before it. The root
//! itself is never created.

use crate::error::{ResolveError, ResourceRef, Result};
use crate::locator::{LocateQuery, ResourceLocator};
use crate::model::{Account, Domain, DomainPath};
use crate::outcome::ResolutionLog;
use stackflow_cloud::{CreateSpec, ResourceApi, ResourceKind, Scope};
use stackflow_config::{DomainConfig, TagConfig};

pub struct PathResolver<'a> {
    locator: ResourceLocator<'a>,
    config: &'a DomainConfig,
}

impl<'a> PathResolver<'a> {
    pub fn new(api: &'a dyn ResourceApi, tags: &'a TagConfig, config: &'a DomainConfig) -> Self {
        // Same-named siblings must stay ambiguous, so no cluster tie-break here
        Self {
            locator: ResourceLocator::new(api, tags),
            config,
        }
    }

    /// Parse a raw path with the configured root name
    pub fn parse(&self, raw: &str) -> Result<DomainPath> {
        DomainPath::parse(raw, &self.config.root_name)
    }

    pub async fn resolve(&self, path: &DomainPath, allow_create: bool) -> Result<Domain> {
        let mut log = ResolutionLog::new();
        self.resolve_logged(path, allow_create, &mut log).await
    }

    /// Resolve `path`, recording every segment in `log`
    pub async fn resolve_logged(
        &self,
        path: &DomainPath,
        allow_create: bool,
        log: &mut ResolutionLog,
    ) -> Result<Domain> {
        let root_query = LocateQuery::new(ResourceKind::Domain, &self.config.root_name).top_level();
        let root = self.locator.find_or_create(&root_query, None).await?;
        log.resolved(ResourceKind::Domain, &self.config.root_name, &root.id, false);

        let mut chain = vec![root.id];
        for segment in path.segments() {
            let parent = chain.last().cloned().unwrap_or_default();
            let query = LocateQuery::new(ResourceKind::Domain, segment).with_parent(&parent);
            let spec = allow_create
                .then(|| CreateSpec::new(segment).with_parent(Some(parent.as_str())));

            let located = self.locator.find_or_create(&query, spec.as_ref()).await?;
            log.resolved(ResourceKind::Domain, segment, &located.id, located.created);
            chain.push(located.id);
        }

        let id = chain.last().cloned().unwrap_or_default();
        let name = path.leaf().unwrap_or(&self.config.root_name).to_string();
        tracing::debug!("Resolved domain '{}' to {}", path, id);

        Ok(Domain {
            name,
            path: path.clone(),
            id,
            chain,
        })
    }

    /// Check a cached domain still exists, by id only
    pub async fn revalidate(&self, domain: &Domain) -> Result<Domain> {
        let resource = self
            .locator
            .locate_by_id(ResourceKind::Domain, &domain.id)
            .await?;
        if resource.name != domain.name {
            return Err(ResolveError::invalid(
                ResourceRef::global(ResourceKind::Domain, &domain.name),
                format!("id {} now names '{}'", domain.id, resource.name),
            ));
        }
        Ok(domain.clone())
    }

    /// Resolve an account inside an already resolved domain
    pub async fn resolve_account(
        &self,
        domain: &Domain,
        name: &str,
        allow_create: bool,
        log: &mut ResolutionLog,
    ) -> Result<Account> {
        if name.trim().is_empty() {
            return Err(ResolveError::invalid(
                ResourceRef::new(ResourceKind::Account, name, domain.scope()),
                "account name is empty",
            ));
        }

        let query = LocateQuery::new(ResourceKind::Account, name).with_scope(domain.scope());
        let spec = allow_create.then(|| CreateSpec::new(name).with_scope(domain.scope()));

        let located = self.locator.find_or_create(&query, spec.as_ref()).await?;
        // Global resources are visible from every scope; an account must sit
        // in exactly this domain
        if located.resource.scope != Scope::domain(&domain.id) {
            return Err(ResolveError::invariant(
                query.target(),
                format!("account {} belongs to {}", located.id, located.resource.scope),
            ));
        }
        log.resolved(ResourceKind::Account, name, &located.id, located.created);
        Ok(Account::new(name, domain.clone(), located.id))
    }

    pub async fn revalidate_account(&self, account: &Account) -> Result<Account> {
        let resource = self
            .locator
            .locate_by_id(ResourceKind::Account, account.id())
            .await?;
        if resource.scope != Scope::domain(&account.domain().id) {
            return Err(ResolveError::invariant(
                ResourceRef::new(ResourceKind::Account, account.name(), account.scope()),
                format!("account moved to {}", resource.scope),
            ));
        }
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use stackflow_cloud::{MemoryCloud, Operation, RemoteResource};

    fn cloud_with_root() -> MemoryCloud {
        let cloud = MemoryCloud::new();
        cloud.seed(RemoteResource::new("root-id", ResourceKind::Domain, "ROOT"));
        cloud
    }

    #[tokio::test]
    async fn test_creates_missing_segments_in_order() {
        let cloud = cloud_with_root();
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let path = resolver.parse("foo/FakeDomainName").unwrap();
        let domain = resolver.resolve(&path, true).await.unwrap();

        let foo = cloud.get(&domain.chain[1]).unwrap();
        let leaf = cloud.get(&domain.chain[2]).unwrap();
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.parent_id.as_deref(), Some("root-id"));
        assert_eq!(leaf.name, "FakeDomainName");
        assert_eq!(leaf.parent_id.as_deref(), Some(foo.id.as_str()));
        assert_eq!(domain.id, leaf.id);
        assert_eq!(domain.chain[0], "root-id");
        assert!(cloud.tags_of(&leaf.id).contains_key("create_by_CAPC"));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let cloud = cloud_with_root();
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let path = resolver.parse("ROOT/foo/FakeDomainName").unwrap();
        let first = resolver.resolve(&path, true).await.unwrap();
        let second = resolver.resolve(&path, true).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(cloud.calls(Operation::Create), 2);
    }

    #[tokio::test]
    async fn test_missing_segment_without_create() {
        let cloud = cloud_with_root();
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let path = resolver.parse("foo").unwrap();
        let err = resolver.resolve(&path, false).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert_eq!(err.target().name, "foo");
    }

    #[tokio::test]
    async fn test_root_is_never_created() {
        let cloud = MemoryCloud::new();
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let err = resolver.resolve(&DomainPath::default(), true).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert_eq!(cloud.calls(Operation::Create), 0);
    }

    #[tokio::test]
    async fn test_same_named_siblings_are_ambiguous() {
        let cloud = cloud_with_root();
        for id in ["foo-a", "foo-b"] {
            cloud.seed(RemoteResource::new(id, ResourceKind::Domain, "foo").with_parent("root-id"));
        }
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let err = resolver
            .resolve(&resolver.parse("foo").unwrap(), true)
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Ambiguous);
    }

    #[tokio::test]
    async fn test_revalidate_detects_deleted_domain() {
        let cloud = cloud_with_root();
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);

        let domain = resolver
            .resolve(&resolver.parse("FakeDomainName").unwrap(), true)
            .await
            .unwrap();
        assert_eq!(resolver.revalidate(&domain).await.unwrap(), domain);

        let lists_before = cloud.calls(Operation::List);
        resolver.revalidate(&domain).await.unwrap();
        assert_eq!(cloud.calls(Operation::List), lists_before + 1);

        cloud.delete(&domain.id).await.unwrap();
        let err = resolver.revalidate(&domain).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_account() {
        let cloud = cloud_with_root();
        let tags = TagConfig::default();
        let domains = DomainConfig::default();
        let resolver = PathResolver::new(&cloud, &tags, &domains);
        let mut log = ResolutionLog::new();

        let domain = resolver
            .resolve(&resolver.parse("FakeDomainName").unwrap(), true)
            .await
            .unwrap();
        let err = resolver
            .resolve_account(&domain, "FakeAccountName", false, &mut log)
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);

        cloud.seed(
            RemoteResource::new("FakeAccountID", ResourceKind::Account, "FakeAccountName")
                .with_scope(Scope::domain(&domain.id)),
        );
        let account = resolver
            .resolve_account(&domain, "FakeAccountName", false, &mut log)
            .await
            .unwrap();
        assert_eq!(account.id(), "FakeAccountID");
        assert_eq!(account.scope(), Scope::account(&domain.id, "FakeAccountID"));
        assert_eq!(resolver.revalidate_account(&account).await.unwrap(), account);
    }
}
