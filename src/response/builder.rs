//! Response Builder
//!
//! Joins a stored component with the plugins bound to it. Building never
//! mutates the component; the only failure is a failed binding lookup.

use crate::crd::{Component, ComponentSpec, PluginSpec};
use crate::error::Result;
use crate::sync::PluginBindingReconciler;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level keys owned by [`ComponentDetails`]; workload fields with these
/// names are left out of the rendered details
const DETAIL_FIELDS: &[&str] = &[
    "name",
    "namespace",
    "resourceVersion",
    "createdAt",
    "volumes",
    "plugins",
    "claims",
];

/// Detailed view of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDetails {
    pub name: String,
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Workload specification as stored, minus fields shadowed by the view
    #[serde(flatten)]
    pub spec: ComponentSpec,

    /// Bound plugins, ordered by identity
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    /// Claim names of the persistent-claim volumes
    #[serde(default)]
    pub claims: Vec<String>,
}

/// Builds component details from the binding index
#[derive(Clone)]
pub struct ResponseBuilder {
    bindings: PluginBindingReconciler,
}

impl ResponseBuilder {
    pub fn new(bindings: PluginBindingReconciler) -> Self {
        Self { bindings }
    }

    pub async fn build_details(&self, component: &Component) -> Result<ComponentDetails> {
        let name = component.name_any();
        let namespace = component.namespace().unwrap_or_default();
        let plugins = self.bindings.bound_plugins(&namespace, &name).await?;

        let mut spec = component.spec.clone();
        spec.workload.retain(|key, _| {
            let shadowed = DETAIL_FIELDS.contains(&key.as_str());
            if shadowed {
                debug!("Omitting workload field {} of {}/{} from details", key, namespace, name);
            }
            !shadowed
        });

        Ok(ComponentDetails {
            claims: component
                .spec
                .claim_volumes()
                .map(|v| v.claim_name.clone())
                .filter(|c| !c.is_empty())
                .collect(),
            resource_version: component.resource_version(),
            created_at: component.creation_timestamp().map(|t| t.0),
            spec,
            name,
            namespace,
            plugins,
        })
    }

    /// Build details for every component concurrently, preserving input order
    pub async fn build_details_list(&self, components: &[Component]) -> Result<Vec<ComponentDetails>> {
        try_join_all(components.iter().map(|c| self.build_details(c))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentPluginBinding, Volume};
    use crate::domain::ports::ObjectStore;
    use crate::error::Error;
    use crate::metrics::SyncMetrics;
    use crate::store::MemoryStore;
    use crate::sync::testing::RecordingStore;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        bindings: Arc<RecordingStore<ComponentPluginBinding>>,
        reconciler: PluginBindingReconciler,
        components: MemoryStore<Component>,
    }

    fn fixture() -> Fixture {
        let bindings = Arc::new(RecordingStore::new(Arc::new(
            MemoryStore::<ComponentPluginBinding>::new(),
        )));
        Fixture {
            reconciler: PluginBindingReconciler::new(bindings.clone(), SyncMetrics::new()),
            bindings,
            components: MemoryStore::new(),
        }
    }

    async fn stored_component(f: &Fixture, name: &str, plugins: &[PluginSpec]) -> Component {
        let mut volume = Volume::claim("/data", "1Gi");
        volume.claim_name = format!("pvc-{}-1700000000-1", name);
        let mut component = Component::new(
            name,
            ComponentSpec {
                volumes: vec![volume, Volume::claim("/cache", "1Gi")],
                workload: [("image".to_string(), json!("nginx"))].into(),
            },
        );
        component.metadata.namespace = Some("shop".into());
        let component = f.components.create(&component).await.unwrap();

        f.reconciler
            .reconcile_component(&component, plugins, &CancellationToken::new())
            .await
            .unwrap();
        component
    }

    #[tokio::test]
    async fn test_build_details() {
        let f = fixture();
        let component = stored_component(
            &f,
            "web",
            &[PluginSpec::new("z"), PluginSpec::new("a").with_config(json!({"k": 1}))],
        )
        .await;
        let before = component.clone();

        let details = ResponseBuilder::new(f.reconciler.clone())
            .build_details(&component)
            .await
            .unwrap();

        assert_eq!(component, before);
        assert_eq!(details.name, "web");
        assert_eq!(details.namespace, "shop");
        assert_eq!(details.resource_version, component.resource_version());
        assert!(details.created_at.is_some());
        assert_eq!(details.claims, vec!["pvc-web-1700000000-1"]);
        let names: Vec<_> = details.plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "z"]);
        assert_eq!(details.plugins[0].config, Some(json!({"k": 1})));

        let rendered = serde_json::to_value(&details).unwrap();
        assert_eq!(rendered["image"], json!("nginx"));
        assert_eq!(rendered["resourceVersion"], json!(details.resource_version));
    }

    #[tokio::test]
    async fn test_build_details_list_preserves_order() {
        let f = fixture();
        let worker = stored_component(&f, "worker", &[PluginSpec::new("a")]).await;
        let api = stored_component(&f, "api", &[]).await;

        let details = ResponseBuilder::new(f.reconciler.clone())
            .build_details_list(&[worker, api])
            .await
            .unwrap();

        let names: Vec<_> = details.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["worker", "api"]);
        assert_eq!(details[0].plugins.len(), 1);
        assert!(details[1].plugins.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let f = fixture();
        let component = stored_component(&f, "web", &[]).await;
        f.bindings.fail_lists(true);

        let result = ResponseBuilder::new(f.reconciler.clone())
            .build_details(&component)
            .await;
        assert_matches!(result, Err(Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_workload_cannot_shadow_detail_fields() {
        let f = fixture();
        let mut component = Component::new(
            "web",
            ComponentSpec {
                volumes: vec![Volume::claim("/data", "1Gi")],
                workload: [
                    ("image".to_string(), json!("nginx")),
                    ("name".to_string(), json!("other")),
                    ("namespace".to_string(), json!("elsewhere")),
                    ("claims".to_string(), json!(["pvc-forged"])),
                    ("createdAt".to_string(), json!("1970-01-01T00:00:00Z")),
                ]
                .into(),
            },
        );
        component.spec.volumes[0].claim_name = "pvc-web-1700000000-1".into();
        component.metadata.namespace = Some("shop".into());
        let component = f.components.create(&component).await.unwrap();

        let details = ResponseBuilder::new(f.reconciler.clone())
            .build_details(&component)
            .await
            .unwrap();

        let text = serde_json::to_string(&details).unwrap();
        for key in ["\"name\":", "\"namespace\":", "\"claims\":", "\"createdAt\":"] {
            assert_eq!(text.matches(key).count(), 1, "{} rendered more than once", key);
        }

        let rendered: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(rendered["name"], "web");
        assert_eq!(rendered["namespace"], "shop");
        assert_eq!(rendered["claims"], json!(["pvc-web-1700000000-1"]));
        assert_eq!(rendered["image"], "nginx");
        assert_eq!(component.spec.workload.len(), 5);
    }
}
