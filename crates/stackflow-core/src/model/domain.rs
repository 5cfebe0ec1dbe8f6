//! Organizational domains and accounts

use crate::error::{ResolveError, ResourceRef, Result};
use serde::{Deserialize, Serialize};
use stackflow_cloud::{ResourceKind, Scope};

/// "/"-delimited domain path below the platform root
///
/// A leading root segment (e.g. `ROOT/foo`) is accepted and stripped, so
/// `ROOT/foo/bar` and `foo/bar` name the same domain. The empty path is the
/// root domain itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainPath {
    segments: Vec<String>,
}

impl DomainPath {
    pub fn parse(raw: &str, root_name: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let mut segments = Vec::new();
        for (index, segment) in trimmed.split('/').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(ResolveError::invalid(
                    ResourceRef::global(ResourceKind::Domain, raw),
                    format!("empty path segment at position {}", index),
                ));
            }
            if index == 0 && segment.eq_ignore_ascii_case(root_name) {
                continue;
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, or `None` for the root
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl std::fmt::Display for DomainPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A resolved domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub path: DomainPath,
    pub id: String,
    /// Remote ids from the root down to this domain, one per path level
    pub chain: Vec<String>,
}

impl Domain {
    pub fn scope(&self) -> Scope {
        Scope::domain(&self.id)
    }
}

/// A tenant account; its domain is fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    name: String,
    domain: Domain,
    id: String,
}

impl Account {
    pub fn new(name: impl Into<String>, domain: Domain, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain,
            id: id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn scope(&self) -> Scope {
        Scope::account(&self.domain.id, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn test_parse_strips_root() {
        let path = DomainPath::parse("ROOT/foo/FakeDomainName", "ROOT").unwrap();
        assert_eq!(path.segments(), ["foo", "FakeDomainName"]);
        assert_eq!(path, DomainPath::parse("foo/FakeDomainName", "ROOT").unwrap());
        assert_eq!(path, DomainPath::parse("root/foo/FakeDomainName/", "ROOT").unwrap());
        assert_eq!(path.leaf(), Some("FakeDomainName"));
        assert_eq!(path.to_string(), "foo/FakeDomainName");
    }

    #[test]
    fn test_parse_root_only() {
        assert!(DomainPath::parse("ROOT", "ROOT").unwrap().is_root());
        assert!(DomainPath::parse("", "ROOT").unwrap().is_root());
    }

    #[test]
    fn test_root_name_only_stripped_at_start() {
        let path = DomainPath::parse("foo/ROOT", "ROOT").unwrap();
        assert_eq!(path.segments(), ["foo", "ROOT"]);
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        let err = DomainPath::parse("foo//bar", "ROOT").unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidSpec);
        assert!(DomainPath::parse("/foo", "ROOT").is_err());
    }

    #[test]
    fn test_account_scope() {
        let domain = Domain {
            name: "FakeDomainName".into(),
            path: DomainPath::parse("FakeDomainName", "ROOT").unwrap(),
            id: "FakeDomainID".into(),
            chain: vec!["root".into(), "FakeDomainID".into()],
        };
        let account = Account::new("FakeAccountName", domain, "FakeAccountID");
        assert_eq!(account.scope(), Scope::account("FakeDomainID", "FakeAccountID"));
        assert_eq!(account.domain().name, "FakeDomainName");
    }
}
