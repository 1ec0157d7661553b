//! Domain Ports - Core trait definitions for the orchestrator
//!
//! These traits define the boundary between the synchronization logic and
//! the control-plane store. Adapters implement them to provide concrete
//! storage: the Kubernetes API server, or an in-memory fake.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Label Selector
// =============================================================================

/// Equality-based label selector (`key=value,key2=value2`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    terms: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector matching every object
    pub fn everything() -> Self {
        Self::default()
    }

    /// Selector requiring `key=value`
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and(key, value)
    }

    /// Add another `key=value` requirement
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.insert(key.into(), value.into());
        self
    }

    /// True when the selector has no requirements
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Check the selector against an object's labels
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.terms.iter().all(|(key, value)| {
            labels
                .and_then(|l| l.get(key))
                .map(|v| v == value)
                .unwrap_or(false)
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

// =============================================================================
// Object Store Port
// =============================================================================

/// Access to namespaced objects in the control-plane store
///
/// Writes are guarded by the object's `metadata.resourceVersion`:
/// - `create` fails with `ResourceExists` when the name is taken, and rejects
///   objects that already carry a resource version
/// - `update` requires the resource version of the currently stored object
///   and fails with `VersionConflict` when it is missing or stale
///
/// Lookups of a missing namespace or name fail with `ResourceNotFound`.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Create a new object; namespace and name come from its metadata
    async fn create(&self, object: &K) -> Result<K>;

    /// Fetch one object
    async fn get(&self, namespace: &str, name: &str) -> Result<K>;

    /// List objects in a namespace matching `selector`
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<K>>;

    /// Replace an object under optimistic concurrency
    async fn update(&self, object: &K) -> Result<K>;

    /// Delete one object
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display() {
        let selector = LabelSelector::eq("core.kalm.dev/component", "web").and("tier", "front");
        assert_eq!(selector.to_string(), "core.kalm.dev/component=web,tier=front");
        assert_eq!(LabelSelector::everything().to_string(), "");
    }

    #[test]
    fn test_selector_matches() {
        let mut labels = BTreeMap::new();
        labels.insert("core.kalm.dev/component".to_string(), "web".to_string());

        assert!(LabelSelector::everything().matches(None));
        assert!(LabelSelector::eq("core.kalm.dev/component", "web").matches(Some(&labels)));
        assert!(!LabelSelector::eq("core.kalm.dev/component", "api").matches(Some(&labels)));
        assert!(!LabelSelector::eq("core.kalm.dev/component", "web").matches(None));
    }
}
