//! Plugin Binding Reconciler
//!
//! Drives the ComponentPluginBinding objects of one component toward a
//! desired plugin list. Existing bindings are found through the component
//! label index and partitioned three ways against the desired list:
//!
//! | Existing | Desired | Action                                  |
//! |----------|---------|-----------------------------------------|
//! | yes      | yes     | update in place when the spec differs   |
//! | no       | yes     | create                                  |
//! | yes      | no      | delete                                  |
//!
//! Matching is by plugin identity (kind, name) only, so a configuration change
//! keeps the binding object (and its UID) instead of recreating it. A matched
//! binding missing the component's owner reference is updated to carry it. Every
//! sub-operation is attempted; failures are collected into one
//! `Error::Reconciliation` after the others have been applied.

use super::cancellable;
use crate::crd::{
    binding_object_name, Component, ComponentPluginBinding, ComponentPluginBindingSpec,
    PluginIdentity, PluginSpec, COMPONENT_LABEL,
};
use crate::domain::ports::{LabelSelector, ObjectStore};
use crate::error::{BindingFailure, BindingOperation, Error, Result};
use crate::metrics::SyncMetrics;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use indexmap::IndexMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Plan
// =============================================================================

/// Three-way partition of existing bindings against the desired plugins
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Desired plugins with no binding yet
    pub create: Vec<PluginSpec>,
    /// Matched bindings whose spec must change, with their target plugin
    pub update: Vec<(ComponentPluginBinding, PluginSpec)>,
    /// Bindings no longer desired, plus duplicates of a matched identity
    pub delete: Vec<ComponentPluginBinding>,
    /// Matched bindings already in the desired state
    pub unchanged: Vec<PluginIdentity>,
}

impl ReconcilePlan {
    /// Number of store writes this plan needs
    pub fn writes(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

/// Partition `existing` bindings of `component_name` against `desired`
///
/// Fails with `Validation` when `desired` repeats a plugin identity. When
/// several existing bindings share an identity, the first by object name is
/// kept and the rest are scheduled for deletion. With an `owner`, a matched
/// binding that does not reference it is scheduled for update.
pub fn plan_bindings(
    component_name: &str,
    mut existing: Vec<ComponentPluginBinding>,
    desired: &[PluginSpec],
    owner: Option<&OwnerReference>,
) -> Result<ReconcilePlan> {
    let mut wanted: IndexMap<PluginIdentity, &PluginSpec> = IndexMap::with_capacity(desired.len());
    for plugin in desired {
        if wanted.insert(plugin.identity(), plugin).is_some() {
            return Err(Error::Validation(format!(
                "plugin {} is listed more than once",
                plugin.identity()
            )));
        }
    }

    existing.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    let mut plan = ReconcilePlan::default();
    let mut matched = HashSet::with_capacity(existing.len());

    for binding in existing {
        let identity = binding.spec.identity();
        match wanted.get(&identity) {
            Some(plugin) if matched.insert(identity.clone()) => {
                let target = ComponentPluginBindingSpec::for_plugin(component_name, plugin);
                if binding.spec == target && is_owned_by(&binding, owner) {
                    plan.unchanged.push(identity);
                } else {
                    plan.update.push((binding, (*plugin).clone()));
                }
            }
            _ => plan.delete.push(binding),
        }
    }

    plan.create = wanted
        .iter()
        .filter(|(identity, _)| !matched.contains(*identity))
        .map(|(_, plugin)| (*plugin).clone())
        .collect();

    Ok(plan)
}

// =============================================================================
// Summary
// =============================================================================

/// What a successful reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: Vec<PluginIdentity>,
    pub updated: Vec<PluginIdentity>,
    pub deleted: Vec<PluginIdentity>,
    pub unchanged: Vec<PluginIdentity>,
}

impl ReconcileSummary {
    /// Number of bindings written
    pub fn changes(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// True when the stored bindings already matched
    pub fn is_noop(&self) -> bool {
        self.changes() == 0
    }
}

type Outcome = (BindingOperation, PluginIdentity, Result<()>);

// =============================================================================
// Reconciler
// =============================================================================

/// Reconciles the plugin bindings of one component at a time
#[derive(Clone)]
pub struct PluginBindingReconciler {
    store: Arc<dyn ObjectStore<ComponentPluginBinding>>,
    metrics: SyncMetrics,
}

impl PluginBindingReconciler {
    pub fn new(store: Arc<dyn ObjectStore<ComponentPluginBinding>>, metrics: SyncMetrics) -> Self {
        Self { store, metrics }
    }

    /// Selector for the bindings of `component_name`
    pub fn selector(component_name: &str) -> LabelSelector {
        LabelSelector::eq(COMPONENT_LABEL, component_name)
    }

    /// Reconcile the bindings of `component_name` in `namespace` to `desired`
    pub async fn reconcile(
        &self,
        namespace: &str,
        component_name: &str,
        desired: &[PluginSpec],
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        self.reconcile_owned(namespace, component_name, None, desired, cancel)
            .await
    }

    /// Reconcile the bindings of a stored component, owner-referencing it
    pub async fn reconcile_component(
        &self,
        component: &Component,
        desired: &[PluginSpec],
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        let namespace = component.namespace().unwrap_or_default();
        let owner = component.controller_owner_ref(&());

        self.reconcile_owned(&namespace, &component.name_any(), owner, desired, cancel)
            .await
    }

    async fn reconcile_owned(
        &self,
        namespace: &str,
        component_name: &str,
        owner: Option<OwnerReference>,
        desired: &[PluginSpec],
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        let existing = cancellable(
            cancel,
            self.store.list(namespace, &Self::selector(component_name)),
        )
        .await?;

        let plan = plan_bindings(component_name, existing, desired, owner.as_ref())?;
        debug!(
            "Binding plan for {}/{}: {} create, {} update, {} delete, {} unchanged",
            namespace,
            component_name,
            plan.create.len(),
            plan.update.len(),
            plan.delete.len(),
            plan.unchanged.len()
        );

        let mut summary = ReconcileSummary {
            unchanged: plan.unchanged.clone(),
            ..Default::default()
        };
        if plan.writes() == 0 {
            return Ok(summary);
        }

        let mut operations: Vec<BoxFuture<'_, Outcome>> = Vec::with_capacity(plan.writes());

        for plugin in &plan.create {
            let binding = new_binding(namespace, component_name, plugin, owner.as_ref());
            let store = self.store.clone();
            operations.push(
                async move {
                    let result = store.create(&binding).await.map(|_| ());
                    (BindingOperation::Create, binding.spec.identity(), result)
                }
                .boxed(),
            );
        }

        for (existing, plugin) in &plan.update {
            let mut binding = existing.clone();
            binding.spec = ComponentPluginBindingSpec::for_plugin(component_name, plugin);
            binding
                .labels_mut()
                .insert(COMPONENT_LABEL.to_string(), component_name.to_string());
            attach_owner(&mut binding, owner.as_ref());
            let store = self.store.clone();
            operations.push(
                async move {
                    let result = store.update(&binding).await.map(|_| ());
                    (BindingOperation::Update, binding.spec.identity(), result)
                }
                .boxed(),
            );
        }

        for binding in &plan.delete {
            let name = binding.name_any();
            let identity = binding.spec.identity();
            let store = self.store.clone();
            let namespace = namespace.to_string();
            operations.push(
                async move {
                    let result = match store.delete(&namespace, &name).await {
                        Err(Error::ResourceNotFound { .. }) => Ok(()),
                        other => other,
                    };
                    (BindingOperation::Delete, identity, result)
                }
                .boxed(),
            );
        }

        let outcomes = cancellable(cancel, join_all(operations).map(Ok)).await?;

        let mut failures = Vec::new();
        for (operation, identity, result) in outcomes {
            self.metrics
                .record_binding(&operation.to_string(), result.is_ok());

            match result {
                Ok(()) => match operation {
                    BindingOperation::Create => summary.created.push(identity),
                    BindingOperation::Update => summary.updated.push(identity),
                    BindingOperation::Delete => summary.deleted.push(identity),
                },
                Err(e) => {
                    warn!(
                        "Failed to {} plugin binding {} of {}/{}: {}",
                        operation, identity, namespace, component_name, e
                    );
                    failures.push(BindingFailure {
                        plugin: identity.to_string(),
                        operation,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Reconciliation { failures });
        }

        summary.created.sort();
        summary.updated.sort();
        summary.deleted.sort();

        info!(
            "Reconciled plugin bindings for {}/{}: {} created, {} updated, {} deleted, {} unchanged",
            namespace,
            component_name,
            summary.created.len(),
            summary.updated.len(),
            summary.deleted.len(),
            summary.unchanged.len()
        );

        Ok(summary)
    }

    /// Bound plugins of a component, ordered by identity
    pub async fn bound_plugins(&self, namespace: &str, component_name: &str) -> Result<Vec<PluginSpec>> {
        let mut bindings = self
            .store
            .list(namespace, &Self::selector(component_name))
            .await?;
        bindings.sort_by_key(|b| b.spec.identity());

        Ok(bindings.iter().map(|b| b.spec.to_plugin()).collect())
    }
}

/// A new binding object for `plugin`, labelled for the component index
fn new_binding(
    namespace: &str,
    component_name: &str,
    plugin: &PluginSpec,
    owner: Option<&OwnerReference>,
) -> ComponentPluginBinding {
    let mut binding = ComponentPluginBinding::new(
        &binding_object_name(component_name, &plugin.identity()),
        ComponentPluginBindingSpec::for_plugin(component_name, plugin),
    );
    binding.metadata.namespace = Some(namespace.to_string());
    binding
        .labels_mut()
        .insert(COMPONENT_LABEL.to_string(), component_name.to_string());
    attach_owner(&mut binding, owner);
    binding
}

fn is_owned_by(binding: &ComponentPluginBinding, owner: Option<&OwnerReference>) -> bool {
    owner.map_or(true, |owner| {
        binding
            .owner_references()
            .iter()
            .any(|r| r.uid == owner.uid)
    })
}

fn attach_owner(binding: &mut ComponentPluginBinding, owner: Option<&OwnerReference>) {
    let Some(owner) = owner else {
        return;
    };

    let refs = binding.metadata.owner_references.get_or_insert_with(Vec::new);
    if !refs.iter().any(|r| r.uid == owner.uid) {
        refs.push(owner.clone());
    }
}
