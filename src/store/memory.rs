//! In-Memory Store
//!
//! Process-local object store using DashMap for per-key locking. Mirrors the
//! API server's write contract: store-assigned resource versions, UIDs and
//! creation timestamps, `AlreadyExists` on duplicate names and `Conflict` on
//! stale resource versions.

use super::{kind_of, object_key, resource_version, StoredObject};
use crate::domain::ports::{LabelSelector, ObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

type ObjectKey = (String, String);

/// In-memory object store
pub struct MemoryStore<K> {
    /// Objects keyed by (namespace, name)
    objects: DashMap<ObjectKey, K>,
    /// Known namespaces; `None` accepts any namespace
    namespaces: RwLock<Option<BTreeSet<String>>>,
    /// Last issued resource version
    revision: AtomicU64,
}

impl<K: StoredObject> MemoryStore<K> {
    /// Create a store that accepts every namespace
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            namespaces: RwLock::new(None),
            revision: AtomicU64::new(0),
        }
    }

    /// Create a store that only resolves the given namespaces
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        *store.namespaces.write() = Some(namespaces.into_iter().map(Into::into).collect());
        store
    }

    /// Register another namespace (no-op for permissive stores)
    pub fn add_namespace(&self, namespace: impl Into<String>) {
        if let Some(known) = self.namespaces.write().as_mut() {
            known.insert(namespace.into());
        }
    }

    /// Number of stored objects across all namespaces
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_namespace(&self, namespace: &str) -> Result<()> {
        match self.namespaces.read().as_ref() {
            Some(known) if !known.contains(namespace) => Err(Error::ResourceNotFound {
                kind: "Namespace".into(),
                name: namespace.into(),
            }),
            _ => Ok(()),
        }
    }

    fn not_found(name: &str) -> Error {
        Error::ResourceNotFound {
            kind: kind_of::<K>(),
            name: name.to_string(),
        }
    }
}

impl<K: StoredObject> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: StoredObject> ObjectStore<K> for MemoryStore<K> {
    async fn create(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_key(object)?;
        self.check_namespace(&namespace)?;

        if resource_version(object).is_some() {
            return Err(Error::Validation(format!(
                "resourceVersion must not be set on {} {} at creation",
                kind_of::<K>(),
                name
            )));
        }

        match self.objects.entry((namespace, name.clone())) {
            Entry::Occupied(_) => Err(Error::ResourceExists {
                kind: kind_of::<K>(),
                name,
            }),
            Entry::Vacant(slot) => {
                let revision = self.next_revision();
                let mut stored = object.clone();
                let meta = stored.meta_mut();
                meta.resource_version = Some(revision.to_string());
                meta.uid = Some(format!("00000000-0000-4000-8000-{:012x}", revision));
                meta.creation_timestamp = Some(Time(Utc::now()));
                meta.generation = Some(1);

                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.check_namespace(namespace)?;

        self.objects
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Self::not_found(name))
    }

    async fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<K>> {
        self.check_namespace(namespace)?;

        let mut items: Vec<K> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .filter(|entry| selector.matches(entry.value().meta().labels.as_ref()))
            .map(|entry| entry.value().clone())
            .collect();

        items.sort_by(|a, b| a.meta().name.cmp(&b.meta().name));
        Ok(items)
    }

    async fn update(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_key(object)?;
        self.check_namespace(&namespace)?;

        let mut current = self
            .objects
            .get_mut(&(namespace, name.clone()))
            .ok_or_else(|| Self::not_found(&name))?;

        let expected = current.meta().resource_version.clone();
        match resource_version(object) {
            Some(token) if Some(token) == expected.as_deref() => {}
            _ => {
                return Err(Error::VersionConflict {
                    kind: kind_of::<K>(),
                    name,
                })
            }
        }

        let revision = self.next_revision();
        let mut stored = object.clone();
        {
            let previous = current.meta();
            let uid = previous.uid.clone();
            let created = previous.creation_timestamp.clone();
            let generation = previous.generation.unwrap_or(0) + 1;

            let meta = stored.meta_mut();
            meta.resource_version = Some(revision.to_string());
            meta.uid = uid;
            meta.creation_timestamp = created;
            meta.generation = Some(generation);
        }

        *current = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.check_namespace(namespace)?;

        self.objects
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(name))
    }
}
