//! In-memory platform backend
//!
//! Keeps resources and tags in process. Used by the test suites and for dry
//! runs; it can inject failures and simulate a concurrent writer to exercise
//! the resolver's race handling.

use crate::error::{CloudError, Result};
use crate::provider::{CreateSpec, ResourceApi, ResourceFilter};
use crate::resource::{RemoteResource, ResourceKind, ResourceStatus};
use crate::tags::TagSet;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Operation names used for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Tag,
    Untag,
    ListTags,
    Delete,
}

#[derive(Default)]
struct MemoryState {
    /// Resources in creation order
    resources: BTreeMap<u64, RemoteResource>,
    tags: HashMap<String, TagSet>,
    next_seq: u64,
    faults: HashMap<Operation, VecDeque<CloudError>>,
    /// Resources another writer "creates" right before our next create
    racers: VecDeque<RemoteResource>,
    create_status: HashMap<ResourceKind, ResourceStatus>,
    calls: HashMap<Operation, usize>,
}

impl MemoryState {
    fn record(&mut self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn insert(&mut self, resource: RemoteResource) {
        self.next_seq += 1;
        self.resources.insert(self.next_seq, resource);
    }

    fn find(&self, id: &str) -> Option<&RemoteResource> {
        self.resources.values().find(|r| r.id == id)
    }

    fn collides(&self, kind: ResourceKind, spec: &CreateSpec) -> bool {
        self.resources.values().any(|r| {
            r.kind == kind
                && r.name == spec.name
                && r.parent_id == spec.parent_id
                && r.scope == spec.scope
        })
    }
}

/// In-memory [`ResourceApi`] implementation
pub struct MemoryCloud {
    state: Mutex<MemoryState>,
    /// Kinds whose names are unique per parent and scope
    unique_kinds: HashSet<ResourceKind>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCloud {
    /// Domains and accounts reject duplicate names, like the real platform
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            unique_kinds: [ResourceKind::Domain, ResourceKind::Account]
                .into_iter()
                .collect(),
        }
    }

    /// Reject duplicate names for `kind` too
    pub fn with_unique_kind(mut self, kind: ResourceKind) -> Self {
        self.unique_kinds.insert(kind);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a pre-existing resource, as if created out of band
    pub fn seed(&self, resource: RemoteResource) {
        self.lock().insert(resource);
    }

    /// Insert a pre-existing resource together with its tags
    pub fn seed_tagged(&self, resource: RemoteResource, tags: TagSet) {
        let mut state = self.lock();
        state.tags.insert(resource.id.clone(), tags);
        state.insert(resource);
    }

    /// Make the next call of `op` fail with `err`
    pub fn fail_next(&self, op: Operation, err: CloudError) {
        self.lock().faults.entry(op).or_default().push_back(err);
    }

    /// Simulate a concurrent writer that creates `resource` just before our
    /// next create lands
    pub fn race_next_create(&self, resource: RemoteResource) {
        self.lock().racers.push_back(resource);
    }

    /// Status newly created resources of `kind` start in
    pub fn set_create_status(&self, kind: ResourceKind, status: ResourceStatus) {
        self.lock().create_status.insert(kind, status);
    }

    /// Change the status of an existing resource
    pub fn set_status(&self, id: &str, status: ResourceStatus) -> bool {
        let mut state = self.lock();
        match state.resources.values_mut().find(|r| r.id == id) {
            Some(r) => {
                r.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<RemoteResource> {
        self.lock().find(id).cloned()
    }

    pub fn resources_of(&self, kind: ResourceKind) -> Vec<RemoteResource> {
        self.lock()
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn tags_of(&self, id: &str) -> TagSet {
        self.lock().tags.get(id).cloned().unwrap_or_default()
    }

    /// Number of times `op` was invoked
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ResourceApi for MemoryCloud {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, kind: ResourceKind, filter: &ResourceFilter) -> Result<Vec<RemoteResource>> {
        let mut state = self.lock();
        state.record(Operation::List)?;

        Ok(state
            .resources
            .values()
            .filter(|r| r.kind == kind && filter.matches(r))
            .cloned()
            .collect())
    }

    async fn create(&self, kind: ResourceKind, spec: &CreateSpec) -> Result<RemoteResource> {
        let mut state = self.lock();
        state.record(Operation::Create)?;

        if let Some(racer) = state.racers.pop_front() {
            tracing::debug!("memory: concurrent writer created {} {}", racer.kind, racer.name);
            state.insert(racer);
        }

        if self.unique_kinds.contains(&kind) && state.collides(kind, spec) {
            return Err(CloudError::ResourceAlreadyExists(format!(
                "{} {}",
                kind, spec.name
            )));
        }

        let id = format!("{}-{}", kind, state.next_seq + 1);
        let status = state
            .create_status
            .get(&kind)
            .copied()
            .unwrap_or(ResourceStatus::Ready);

        let mut resource = RemoteResource::new(id, kind, spec.name.clone())
            .with_scope(spec.scope.clone())
            .with_status(status);
        resource.parent_id = spec.parent_id.clone();
        resource.zone_id = spec.zone_id.clone();
        resource.attributes = spec.attributes.clone();

        if kind == ResourceKind::PublicIp && !resource.attributes.contains_key("address") {
            let address = format!("203.0.113.{}", state.next_seq % 250 + 1);
            resource
                .attributes
                .insert("address".to_string(), serde_json::json!(address));
        }

        if !spec.tags.is_empty() {
            state.tags.insert(resource.id.clone(), spec.tags.clone());
        }
        state.insert(resource.clone());
        Ok(resource)
    }

    async fn tag(&self, resource_id: &str, tags: &TagSet) -> Result<()> {
        let mut state = self.lock();
        state.record(Operation::Tag)?;

        if state.find(resource_id).is_none() {
            return Err(CloudError::ResourceNotFound(resource_id.to_string()));
        }
        state
            .tags
            .entry(resource_id.to_string())
            .or_default()
            .extend(tags);
        Ok(())
    }

    async fn untag(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        let mut state = self.lock();
        state.record(Operation::Untag)?;

        if state.find(resource_id).is_none() {
            return Err(CloudError::ResourceNotFound(resource_id.to_string()));
        }
        if let Some(tags) = state.tags.get_mut(resource_id) {
            for key in keys {
                tags.remove(key);
            }
        }
        Ok(())
    }

    async fn list_tags(&self, resource_id: &str) -> Result<TagSet> {
        let mut state = self.lock();
        state.record(Operation::ListTags)?;

        if state.find(resource_id).is_none() {
            return Err(CloudError::ResourceNotFound(resource_id.to_string()));
        }
        Ok(state.tags.get(resource_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, resource_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(Operation::Delete)?;

        let seq = state
            .resources
            .iter()
            .find(|(_, r)| r.id == resource_id)
            .map(|(seq, _)| *seq)
            .ok_or_else(|| CloudError::ResourceNotFound(resource_id.to_string()))?;

        state.resources.remove(&seq);
        state.tags.remove(resource_id);
        Ok(())
    }
}
