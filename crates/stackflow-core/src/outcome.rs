//! Per-resource resolution results for one pass

use crate::error::{ErrorClass, ResolveError};
use serde::{Deserialize, Serialize};
use stackflow_cloud::ResourceKind;
use std::time::Duration;

/// How a single resource was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Found an existing resource
    Existing,
    /// Created by this pass
    Created,
    /// Exists but is still provisioning
    Pending,
    /// Deleted by this pass
    Deleted,
    Failed(ErrorClass),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Existing | Resolution::Created)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Existing => write!(f, "existing"),
            Resolution::Created => write!(f, "created"),
            Resolution::Pending => write!(f, "pending"),
            Resolution::Deleted => write!(f, "deleted"),
            Resolution::Failed(class) => write!(f, "failed ({})", class),
        }
    }
}

/// One entry of the resolution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionEntry {
    pub kind: ResourceKind,
    pub name: String,
    /// Remote id, when one is known
    pub id: Option<String>,
    pub resolution: Resolution,
}

/// Ordered record of what a pass did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLog {
    pub entries: Vec<ResolutionEntry>,
}

impl ResolutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        id: Option<&str>,
        resolution: Resolution,
    ) {
        self.entries.push(ResolutionEntry {
            kind,
            name: name.into(),
            id: id.map(str::to_string),
            resolution,
        });
    }

    /// Record a resolved resource; `created` picks the variant
    pub fn resolved(&mut self, kind: ResourceKind, name: impl Into<String>, id: &str, created: bool) {
        let resolution = if created {
            Resolution::Created
        } else {
            Resolution::Existing
        };
        self.record(kind, name, Some(id), resolution);
    }

    pub fn failed(&mut self, err: &ResolveError) {
        let target = err.target();
        self.record(
            target.kind,
            target.name.clone(),
            None,
            Resolution::Failed(err.class()),
        );
    }

    pub fn merge(&mut self, other: ResolutionLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries_of(&self, kind: ResourceKind) -> Vec<&ResolutionEntry> {
        self.entries.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn has_changes(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.resolution, Resolution::Created | Resolution::Deleted))
    }

    pub fn summary(&self) -> LogSummary {
        let count = |f: fn(&Resolution) -> bool| {
            self.entries.iter().filter(|e| f(&e.resolution)).count()
        };
        LogSummary {
            existing: count(|r| *r == Resolution::Existing),
            created: count(|r| *r == Resolution::Created),
            pending: count(|r| *r == Resolution::Pending),
            deleted: count(|r| *r == Resolution::Deleted),
            failed: count(|r| matches!(r, Resolution::Failed(_))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    pub existing: usize,
    pub created: usize,
    pub pending: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl std::fmt::Display for LogSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} existing, {} created, {} pending, {} deleted, {} failed",
            self.existing, self.created, self.pending, self.deleted, self.failed
        )
    }
}

/// What the caller's scheduling loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Done,
    RequeueAfter(Duration),
    /// Blocked until the input spec or remote state changes
    AwaitChange,
}

impl NextStep {
    /// Step for a failed pass
    pub fn for_error(err: &ResolveError, retry_after: Duration) -> Self {
        if err.is_retryable() {
            NextStep::RequeueAfter(retry_after)
        } else {
            NextStep::AwaitChange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceRef;

    #[test]
    fn test_summary_counts() {
        let mut log = ResolutionLog::new();
        log.resolved(ResourceKind::Domain, "foo", "domain-1", true);
        log.resolved(ResourceKind::Zone, "zoneA", "z-1", false);
        log.record(ResourceKind::Machine, "m1", Some("machine-3"), Resolution::Pending);
        log.failed(&ResolveError::not_found(ResourceRef::global(
            ResourceKind::Network,
            "net1",
        )));

        let summary = log.summary();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.to_string(),
            "1 existing, 1 created, 1 pending, 0 deleted, 1 failed"
        );
        assert!(log.has_changes());
        assert_eq!(log.entries_of(ResourceKind::Network).len(), 1);
    }

    #[test]
    fn test_next_step_for_error() {
        let delay = Duration::from_secs(10);
        let target = ResourceRef::global(ResourceKind::Zone, "zoneA");

        let transient = ResolveError::RemoteUnavailable {
            target: target.clone(),
            message: "503".into(),
        };
        assert_eq!(NextStep::for_error(&transient, delay), NextStep::RequeueAfter(delay));
        assert_eq!(
            NextStep::for_error(&ResolveError::not_found(target), delay),
            NextStep::AwaitChange
        );
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::Created.to_string(), "created");
        assert_eq!(
            Resolution::Failed(ErrorClass::Ambiguous).to_string(),
            "failed (Ambiguous)"
        );
        assert!(Resolution::Existing.is_resolved());
        assert!(!Resolution::Pending.is_resolved());
    }
}
