//! Ownership tags on remote resources
//!
//! Two markers are in play. The creator marker is written once on every
//! resource this core creates and is what makes a resource deletable. The
//! usage tag records which clusters reference a resource, so a shared
//! resource is only released by the last cluster using it.

use crate::error::{ResolveError, ResourceRef, Result};
use stackflow_cloud::{CloudError, RemoteResource, ResourceApi, ResourceFilter, ResourceKind, TagSet};
use stackflow_config::TagConfig;

pub struct TagManager<'a> {
    api: &'a dyn ResourceApi,
    config: &'a TagConfig,
}

impl<'a> TagManager<'a> {
    pub fn new(api: &'a dyn ResourceApi, config: &'a TagConfig) -> Self {
        Self { api, config }
    }

    /// The creator marker as a tag set
    pub fn creator_tags(&self) -> TagSet {
        TagSet::new().with(&self.config.created_by_key, &self.config.created_by_value)
    }

    async fn read(&self, kind: ResourceKind, resource_id: &str) -> Result<TagSet> {
        self.api
            .list_tags(resource_id)
            .await
            .map_err(|e| ResolveError::remote(ResourceRef::global(kind, resource_id), e))
    }

    /// Add `tags` to a resource, writing only pairs not already present
    ///
    /// Returns whether a write happened.
    pub async fn ensure_tags(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        tags: &TagSet,
    ) -> Result<bool> {
        let current = self.read(kind, resource_id).await?;
        let missing = current.missing_from(tags);
        if missing.is_empty() {
            return Ok(false);
        }

        tracing::debug!("Tagging {} {} with {} tag(s)", kind, resource_id, missing.len());
        self.api
            .tag(resource_id, &missing)
            .await
            .map_err(|e| ResolveError::remote(ResourceRef::global(kind, resource_id), e))?;
        Ok(true)
    }

    /// Whether the creator marker is present
    pub async fn get_ownership(&self, kind: ResourceKind, resource_id: &str) -> Result<bool> {
        let tags = self.read(kind, resource_id).await?;
        Ok(tags.contains_key(&self.config.created_by_key))
    }

    /// Whether the resource is owned by exactly this domain/account pair
    ///
    /// A resource that no longer exists matches nothing.
    pub async fn is_scope_match(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        domain_id: Option<&str>,
        account_id: Option<&str>,
    ) -> Result<bool> {
        let found = self
            .api
            .list(kind, &ResourceFilter::by_id(resource_id))
            .await
            .map_err(|e| ResolveError::remote(ResourceRef::global(kind, resource_id), e))?;

        Ok(found.iter().any(|r| Self::scope_matches(r, domain_id, account_id)))
    }

    /// [`is_scope_match`](Self::is_scope_match) for a resource already in hand
    pub fn scope_matches(
        resource: &RemoteResource,
        domain_id: Option<&str>,
        account_id: Option<&str>,
    ) -> bool {
        resource.scope.domain_id.as_deref() == domain_id
            && resource.scope.account_id.as_deref() == account_id
    }

    pub async fn has_cluster_usage(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        cluster_uid: &str,
    ) -> Result<bool> {
        let tags = self.read(kind, resource_id).await?;
        Ok(tags.contains_key(&self.config.cluster_key(cluster_uid)))
    }

    pub async fn add_cluster_usage(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        cluster_uid: &str,
    ) -> Result<bool> {
        let usage = TagSet::new().with(self.config.cluster_key(cluster_uid), &self.config.cluster_value);
        self.ensure_tags(kind, resource_id, &usage).await
    }

    pub async fn remove_cluster_usage(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        cluster_uid: &str,
    ) -> Result<()> {
        let key = self.config.cluster_key(cluster_uid);
        self.api
            .untag(resource_id, &[key])
            .await
            .map_err(|e| ResolveError::remote(ResourceRef::global(kind, resource_id), e))
    }

    /// Whether any cluster other than `cluster_uid` still uses the resource
    pub async fn in_use_by_other_clusters(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        cluster_uid: &str,
    ) -> Result<bool> {
        let tags = self.read(kind, resource_id).await?;
        Ok(self.other_users(&tags, cluster_uid) > 0)
    }

    fn other_users(&self, tags: &TagSet, cluster_uid: &str) -> usize {
        let own = self.config.cluster_key(cluster_uid);
        tags.keys()
            .filter(|k| k.starts_with(&self.config.cluster_key_prefix) && **k != own)
            .count()
    }

    /// Delete a resource this core created; refuse anything else
    pub async fn delete_if_owned(&self, kind: ResourceKind, resource_id: &str) -> Result<()> {
        if !self.get_ownership(kind, resource_id).await? {
            tracing::warn!("Refusing to delete unowned {} {}", kind, resource_id);
            return Err(ResolveError::OwnershipConflict {
                target: ResourceRef::global(kind, resource_id),
                resource_id: resource_id.to_string(),
            });
        }

        tracing::info!("Deleting {} {}", kind, resource_id);
        self.api
            .delete(resource_id)
            .await
            .map_err(|e| ResolveError::remote(ResourceRef::global(kind, resource_id), e))
    }

    /// Drop this cluster's claim on a resource and delete it when it was
    /// created here and nobody else uses it
    ///
    /// Returns whether the resource was deleted. A resource that is already
    /// gone counts as released.
    pub async fn release(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        cluster_uid: &str,
    ) -> Result<bool> {
        let tags = match self.api.list_tags(resource_id).await {
            Ok(tags) => tags,
            Err(CloudError::ResourceNotFound(_)) => return Ok(false),
            Err(e) => return Err(ResolveError::remote(ResourceRef::global(kind, resource_id), e)),
        };

        if tags.contains_key(&self.config.cluster_key(cluster_uid)) {
            self.remove_cluster_usage(kind, resource_id, cluster_uid).await?;
        }

        let others = self.other_users(&tags, cluster_uid);
        if others > 0 {
            tracing::debug!(
                "Keeping {} {}: still used by {} other cluster(s)",
                kind,
                resource_id,
                others
            );
            return Ok(false);
        }
        if !tags.contains_key(&self.config.created_by_key) {
            tracing::debug!("Keeping {} {}: not created by us", kind, resource_id);
            return Ok(false);
        }

        tracing::info!("Releasing {} {}", kind, resource_id);
        match self.api.delete(resource_id).await {
            Ok(()) | Err(CloudError::ResourceNotFound(_)) => Ok(true),
            Err(e) => Err(ResolveError::remote(ResourceRef::global(kind, resource_id), e)),
        }
    }
}
