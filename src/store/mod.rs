//! Control-Plane Store Adapters
//!
//! Implementations of [`ObjectStore`](crate::domain::ObjectStore):
//! - KubeStore: the Kubernetes API server via `kube::Api`
//! - MemoryStore: an in-process store with the same concurrency contract

mod cluster;
mod memory;

pub use cluster::KubeStore;
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use kube::Resource;
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Bounds shared by every object the stores handle
pub trait StoredObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoredObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Kind name used in error messages
pub(crate) fn kind_of<K: StoredObject>() -> String {
    K::kind(&()).to_string()
}

/// Namespace and name of an object about to be written
pub(crate) fn object_key<K: StoredObject>(object: &K) -> Result<(String, String)> {
    let meta = object.meta();
    let namespace = meta
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| Error::Validation(format!("{} namespace is required", kind_of::<K>())))?;
    let name = meta
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Validation(format!("{} name is required", kind_of::<K>())))?;
    Ok((namespace, name))
}

/// Resource version carried by an object, if any
pub(crate) fn resource_version<K: StoredObject>(object: &K) -> Option<&str> {
    object
        .meta()
        .resource_version
        .as_deref()
        .filter(|rv| !rv.is_empty())
}
