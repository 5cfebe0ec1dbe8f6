//! Generic find-or-create
//!
//! Every lookup is re-run immediately before a create, and a create that
//! loses to a concurrent writer returns the winner instead of failing. That
//! makes [`ResourceLocator::find_or_create`] safe to repeat across passes and
//! across controller replicas.

use crate::error::{ResolveError, ResourceRef, Result};
use crate::tags::TagManager;
use stackflow_cloud::{
    CloudError, CreateSpec, RemoteResource, ResourceApi, ResourceFilter, ResourceKind, Scope,
    TagSet,
};
use stackflow_config::TagConfig;

/// What to look for
#[derive(Debug, Clone, PartialEq)]
pub struct LocateQuery {
    pub kind: ResourceKind,
    pub name: String,
    /// When set, the resource is located by id and `name` is only checked
    pub id: Option<String>,
    pub scope: Scope,
    pub parent_id: Option<String>,
    pub zone_id: Option<String>,
    /// Only match resources without a parent
    pub top_level: bool,
}

impl LocateQuery {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            id: None,
            scope: Scope::global(),
            parent_id: None,
            zone_id: None,
            top_level: false,
        }
    }

    pub fn with_id(mut self, id: Option<&str>) -> Self {
        self.id = id.filter(|i| !i.is_empty()).map(str::to_string);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn top_level(mut self) -> Self {
        self.top_level = true;
        self
    }

    pub fn target(&self) -> ResourceRef {
        let label = match (&self.id, self.name.is_empty()) {
            (Some(id), true) => id.clone(),
            _ => self.name.clone(),
        };
        ResourceRef::new(self.kind, label, self.scope.clone())
    }

    fn filter(&self) -> ResourceFilter {
        let mut filter = ResourceFilter::by_name(&self.name).with_scope(self.scope.clone());
        filter.parent_id = self.parent_id.clone();
        filter.zone_id = self.zone_id.clone();
        filter.top_level = self.top_level;
        filter
    }
}

/// A located resource
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub id: String,
    /// True only when this call created the resource
    pub created: bool,
    pub resource: RemoteResource,
}

impl Located {
    fn existing(resource: RemoteResource) -> Self {
        Self {
            id: resource.id.clone(),
            created: false,
            resource,
        }
    }
}

pub struct ResourceLocator<'a> {
    api: &'a dyn ResourceApi,
    tags: TagManager<'a>,
    cluster_uid: Option<&'a str>,
    /// Sent with the creator marker on every create
    extra_tags: TagSet,
}

impl<'a> ResourceLocator<'a> {
    pub fn new(api: &'a dyn ResourceApi, config: &'a TagConfig) -> Self {
        Self {
            api,
            tags: TagManager::new(api, config),
            cluster_uid: None,
            extra_tags: TagSet::new(),
        }
    }

    /// Prefer candidates carrying this cluster's usage tag on ambiguity
    pub fn for_cluster(mut self, cluster_uid: &'a str) -> Self {
        self.cluster_uid = Some(cluster_uid);
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.extra_tags = tags;
        self
    }

    pub fn tags(&self) -> &TagManager<'a> {
        &self.tags
    }

    /// Record that this cluster uses the resource; no-op without a cluster
    pub async fn claim(&self, kind: ResourceKind, id: &str) -> Result<()> {
        if let Some(uid) = self.cluster_uid.filter(|u| !u.is_empty()) {
            self.tags.add_cluster_usage(kind, id, uid).await?;
        }
        Ok(())
    }

    /// Locate a resource by id; absence is `NotFound`
    pub async fn locate_by_id(&self, kind: ResourceKind, id: &str) -> Result<RemoteResource> {
        let target = ResourceRef::global(kind, id);
        let found = self
            .api
            .list(kind, &ResourceFilter::by_id(id))
            .await
            .map_err(|e| ResolveError::remote(target.clone(), e))?;

        found
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::not_found(target))
    }

    /// Find the single resource matching `query`, creating it from `spec`
    /// when there is none
    pub async fn find_or_create(
        &self,
        query: &LocateQuery,
        spec: Option<&CreateSpec>,
    ) -> Result<Located> {
        if let Some(id) = &query.id {
            let resource = self.locate_by_id(query.kind, id).await?;
            if !query.name.is_empty() && resource.name != query.name {
                return Err(ResolveError::invalid(
                    query.target(),
                    format!("id {} belongs to '{}'", id, resource.name),
                ));
            }
            return Ok(Located::existing(resource));
        }

        if let Some(existing) = self.find_one(query).await? {
            return Ok(Located::existing(existing));
        }

        let Some(spec) = spec else {
            tracing::debug!("{} not found and no create spec given", query.target());
            return Err(ResolveError::not_found(query.target()));
        };

        // Close the window between the first lookup and the create
        if let Some(existing) = self.find_one(query).await? {
            return Ok(Located::existing(existing));
        }

        // The creator marker rides on the create itself, so no resource of
        // ours ever exists untagged
        let spec = spec
            .clone()
            .with_tags(&self.extra_tags)
            .with_tags(&self.tags.creator_tags());

        match self.api.create(query.kind, &spec).await {
            Ok(resource) => {
                tracing::info!("Created {} {} ({})", query.kind, resource.name, resource.id);
                Ok(Located {
                    id: resource.id.clone(),
                    created: true,
                    resource,
                })
            }
            Err(CloudError::ResourceAlreadyExists(detail)) => {
                tracing::warn!("Lost create race for {}: {}", query.target(), detail);
                match self.find_one(query).await? {
                    Some(winner) => Ok(Located::existing(winner)),
                    None => Err(ResolveError::RemoteUnavailable {
                        target: query.target(),
                        message: format!("create conflicted but nothing is visible yet: {}", detail),
                    }),
                }
            }
            Err(e) => Err(ResolveError::remote(query.target(), e)),
        }
    }

    async fn find_one(&self, query: &LocateQuery) -> Result<Option<RemoteResource>> {
        let candidates = self
            .api
            .list(query.kind, &query.filter())
            .await
            .map_err(|e| ResolveError::remote(query.target(), e))?;

        tracing::debug!(
            "{}: {} candidate(s) via {}",
            query.target(),
            candidates.len(),
            self.api.name()
        );

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.into_iter().next()),
            _ => self.disambiguate(query, candidates).await.map(Some),
        }
    }

    /// Narrow same-named candidates by exact scope, then by this cluster's
    /// usage tag
    async fn disambiguate(
        &self,
        query: &LocateQuery,
        candidates: Vec<RemoteResource>,
    ) -> Result<RemoteResource> {
        let mut in_scope: Vec<RemoteResource> = candidates
            .iter()
            .filter(|c| {
                TagManager::scope_matches(
                    c,
                    query.scope.domain_id.as_deref(),
                    query.scope.account_id.as_deref(),
                )
            })
            .cloned()
            .collect();
        if in_scope.len() == 1 {
            return Ok(in_scope.remove(0));
        }

        let pool = if in_scope.is_empty() { candidates } else { in_scope };

        if let Some(uid) = self.cluster_uid {
            let mut used = Vec::new();
            for candidate in &pool {
                if self.tags.has_cluster_usage(query.kind, &candidate.id, uid).await? {
                    used.push(candidate.clone());
                }
            }
            if used.len() == 1 {
                return Ok(used.remove(0));
            }
        }

        tracing::warn!("{} matches {} resources", query.target(), pool.len());
        Err(ResolveError::Ambiguous {
            target: query.target(),
            candidates: pool.into_iter().map(|r| r.id).collect(),
        })
    }
}
