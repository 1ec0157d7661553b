//! Cluster Store
//!
//! Stores objects in the cluster through `kube::Api`, translating API status
//! codes into the orchestrator's error taxonomy.

use super::{kind_of, object_key, resource_version, StoredObject};
use crate::domain::ports::{LabelSelector, ObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use std::marker::PhantomData;
use tracing::debug;

/// Object store backed by the Kubernetes API server
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StoredObject> KubeStore<K> {
    /// Create a store using an existing client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _kind: PhantomData,
        }
    }
}

/// Map a kube client error onto the store error taxonomy
pub(crate) fn map_kube_error(err: kube::Error, kind: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => Error::ResourceNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            409 if response.reason == "AlreadyExists" => Error::ResourceExists {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            409 => Error::VersionConflict {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            400 | 422 => Error::Validation(response.message),
            code => Error::Transport(format!("{} ({}): {}", response.reason, code, response.message)),
        },
        kube::Error::SerdeError(e) => Error::JsonParse(e),
        other => Error::Transport(other.to_string()),
    }
}

#[async_trait]
impl<K: StoredObject> ObjectStore<K> for KubeStore<K> {
    async fn create(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_key(object)?;
        debug!("Creating {} {}/{}", kind_of::<K>(), namespace, name);

        self.api(&namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| map_kube_error(e, &kind_of::<K>(), &name))
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, &kind_of::<K>(), name))
    }

    async fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }

        let list = self
            .api(namespace)
            .list(&params)
            .await
            .map_err(|e| map_kube_error(e, &kind_of::<K>(), namespace))?;

        Ok(list.items)
    }

    async fn update(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_key(object)?;

        // The API server accepts an unconditional PUT; refuse it here.
        if resource_version(object).is_none() {
            return Err(Error::VersionConflict {
                kind: kind_of::<K>(),
                name,
            });
        }

        debug!("Replacing {} {}/{}", kind_of::<K>(), namespace, name);

        self.api(&namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| map_kube_error(e, &kind_of::<K>(), &name))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        debug!("Deleting {} {}/{}", kind_of::<K>(), namespace, name);

        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, &kind_of::<K>(), name))
    }
}
