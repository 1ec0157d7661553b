//! Component Synchronizer
//!
//! Orchestrates translation, the component store write and binding
//! reconciliation for each flow. The store write is acknowledged before
//! reconciliation starts; a reconciliation failure after a successful write is
//! reported and the component is left in place. Both flows converge when
//! retried with the same request.

use super::cancellable;
use super::reconciler::{PluginBindingReconciler, ReconcileSummary};
use super::translator::{ComponentRequest, ComponentTranslator, Translated};
use crate::crd::{Component, ComponentPluginBinding, PluginSpec};
use crate::domain::ports::{LabelSelector, ObjectStore};
use crate::error::{Error, Result};
use crate::metrics::SyncMetrics;
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a successful create or update
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The component as persisted by the store
    pub component: Component,
    /// Binding changes applied for it
    pub bindings: ReconcileSummary,
}

/// Entry point for component create/update/delete flows
#[derive(Clone)]
pub struct ComponentSynchronizer {
    translator: ComponentTranslator,
    components: Arc<dyn ObjectStore<Component>>,
    reconciler: PluginBindingReconciler,
    metrics: SyncMetrics,
}

impl ComponentSynchronizer {
    pub fn new(
        translator: ComponentTranslator,
        components: Arc<dyn ObjectStore<Component>>,
        bindings: Arc<dyn ObjectStore<ComponentPluginBinding>>,
        metrics: SyncMetrics,
    ) -> Self {
        let reconciler = PluginBindingReconciler::new(bindings, metrics.clone());
        Self {
            translator,
            components,
            reconciler,
            metrics,
        }
    }

    /// The binding reconciler used by the flows
    pub fn reconciler(&self) -> &PluginBindingReconciler {
        &self.reconciler
    }

    /// Translate, create, then reconcile bindings
    pub async fn create(
        &self,
        namespace: &str,
        request: ComponentRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let result = self.create_flow(namespace, request, cancel).await;
        self.metrics.record_flow("create", &result);
        result
    }

    async fn create_flow(
        &self,
        namespace: &str,
        request: ComponentRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let Translated { component, plugins } = self.translator.translate(namespace, None, request)?;
        let name = component.name_any();

        let created = cancellable(cancel, self.components.create(&component)).await?;
        info!(
            "Created component {}/{} at version {}",
            namespace,
            name,
            created.resource_version().unwrap_or_default()
        );

        let bindings = self
            .reconcile_after_write(&created, &plugins, cancel)
            .await?;

        Ok(SyncOutcome {
            component: created,
            bindings,
        })
    }

    /// Translate, read the current token, update, then reconcile bindings
    ///
    /// A token carried by the request is checked against the store; without
    /// one the token read from the store is used.
    pub async fn update(
        &self,
        namespace: &str,
        name: &str,
        request: ComponentRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let result = self.update_flow(namespace, name, request, cancel).await;
        self.metrics.record_flow("update", &result);
        result
    }

    async fn update_flow(
        &self,
        namespace: &str,
        name: &str,
        mut request: ComponentRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let client_version = request.resource_version.take();
        let Translated {
            mut component,
            plugins,
        } = self.translator.translate(namespace, Some(name), request)?;

        let current = cancellable(cancel, self.components.get(namespace, name)).await?;
        component.metadata.resource_version = client_version.or_else(|| current.resource_version());
        debug!(
            "Updating component {}/{} from version {}",
            namespace,
            name,
            current.resource_version().unwrap_or_default()
        );

        let updated = cancellable(cancel, self.components.update(&component)).await?;
        info!(
            "Updated component {}/{} to version {}",
            namespace,
            name,
            updated.resource_version().unwrap_or_default()
        );

        let bindings = self
            .reconcile_after_write(&updated, &plugins, cancel)
            .await?;

        Ok(SyncOutcome {
            component: updated,
            bindings,
        })
    }

    async fn reconcile_after_write(
        &self,
        component: &Component,
        plugins: &[PluginSpec],
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        self.reconciler
            .reconcile_component(component, plugins, cancel)
            .await
            .map_err(|e| {
                warn!(
                    "Component {}/{} was written but its plugin bindings were not: {}",
                    component.namespace().unwrap_or_default(),
                    component.name_any(),
                    e
                );
                e
            })
    }

    /// Delete a component, then remove its bindings
    pub async fn delete(&self, namespace: &str, name: &str, cancel: &CancellationToken) -> Result<()> {
        let result = self.delete_flow(namespace, name, cancel).await;
        self.metrics.record_flow("delete", &result);
        result
    }

    async fn delete_flow(&self, namespace: &str, name: &str, cancel: &CancellationToken) -> Result<()> {
        if namespace.is_empty() {
            return Err(Error::Validation("application namespace is required".into()));
        }

        cancellable(cancel, self.components.delete(namespace, name)).await?;
        info!("Deleted component {}/{}", namespace, name);

        let summary = self.reconciler.reconcile(namespace, name, &[], cancel).await?;
        if !summary.deleted.is_empty() {
            debug!(
                "Removed {} plugin binding(s) of {}/{}",
                summary.deleted.len(),
                namespace,
                name
            );
        }

        Ok(())
    }

    /// Fetch one component
    pub async fn get(&self, namespace: &str, name: &str, cancel: &CancellationToken) -> Result<Component> {
        cancellable(cancel, self.components.get(namespace, name)).await
    }

    /// List the components of a namespace, ordered by name
    pub async fn list(&self, namespace: &str, cancel: &CancellationToken) -> Result<Vec<Component>> {
        let mut components = cancellable(
            cancel,
            self.components.list(namespace, &LabelSelector::everything()),
        )
        .await?;
        components.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(components)
    }
}
