//! Component Translator
//!
//! Turns an inbound component description into the canonical Component
//! resource plus the desired plugin list, which is reconciled separately.

use super::claim_name::ClaimNameGenerator;
use crate::crd::{Component, ComponentSpec, PluginSpec};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Component description as submitted by a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRequest {
    /// Component name; the route name takes precedence when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Concurrency token the client last read; only honoured on update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Desired plugin bindings
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    /// Workload specification, volumes included
    #[serde(flatten)]
    pub spec: ComponentSpec,
}

/// Translation output: the resource to persist and the bindings to reconcile
#[derive(Debug, Clone)]
pub struct Translated {
    pub component: Component,
    pub plugins: Vec<PluginSpec>,
}

/// Builds canonical components from client descriptions
#[derive(Clone)]
pub struct ComponentTranslator {
    claim_names: Arc<dyn ClaimNameGenerator>,
}

impl ComponentTranslator {
    pub fn new(claim_names: Arc<dyn ClaimNameGenerator>) -> Self {
        Self { claim_names }
    }

    /// Translate a request addressed to `namespace` (and `route_name` for updates)
    pub fn translate(
        &self,
        namespace: &str,
        route_name: Option<&str>,
        request: ComponentRequest,
    ) -> Result<Translated> {
        if namespace.is_empty() {
            return Err(Error::Validation("application namespace is required".into()));
        }

        let name = route_name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| request.name.filter(|n| !n.is_empty()))
            .ok_or_else(|| Error::Validation("component name is required".into()))?;
        validate_name(&name)?;
        validate_plugins(&request.plugins)?;

        let mut component = Component::new(&name, request.spec);
        component.metadata.namespace = Some(namespace.to_string());

        let generated = self.fill_claim_names(&mut component);
        if generated > 0 {
            debug!("Generated {} claim name(s) for component {}/{}", generated, namespace, name);
        }

        Ok(Translated {
            component,
            plugins: request.plugins,
        })
    }

    /// Name every unnamed persistent-claim volume; returns how many were named
    pub fn fill_claim_names(&self, component: &mut Component) -> usize {
        let name = component.metadata.name.clone().unwrap_or_default();
        let mut generated = 0;

        for volume in component.spec.volumes.iter_mut() {
            if volume.needs_claim_name() {
                volume.claim_name = self.claim_names.generate(&name);
                generated += 1;
            }
        }

        generated
    }
}

/// Component names must be DNS-1123 labels
fn validate_name(name: &str) -> Result<()> {
    let valid = name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid component name {:?}: must be a lowercase DNS-1123 label",
            name
        )))
    }
}

fn validate_plugins(plugins: &[PluginSpec]) -> Result<()> {
    let mut seen = HashSet::new();

    for plugin in plugins {
        if plugin.name.is_empty() {
            return Err(Error::Validation("plugin name is required".into()));
        }
        if !seen.insert(plugin.identity()) {
            return Err(Error::Validation(format!(
                "plugin {} is listed more than once",
                plugin.identity()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Volume, VolumeType};
    use crate::sync::claim_name::{parse_claim_name, TimestampClaimNames};
    use crate::sync::testing::SequentialClaimNames;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn translator() -> ComponentTranslator {
        ComponentTranslator::new(Arc::new(SequentialClaimNames::default()))
    }

    fn request(name: Option<&str>, volumes: Vec<Volume>) -> ComponentRequest {
        ComponentRequest {
            name: name.map(str::to_string),
            resource_version: None,
            plugins: vec![],
            spec: ComponentSpec {
                volumes,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_request_deserializes_flattened_spec() {
        let request: ComponentRequest = serde_json::from_value(json!({
            "name": "web",
            "resourceVersion": "7",
            "image": "nginx:1.25",
            "volumes": [{"type": "pvc", "path": "/data", "size": "1Gi"}],
            "plugins": [{"name": "termination-grace", "config": {"seconds": 30}}]
        }))
        .unwrap();

        assert_eq!(request.name.as_deref(), Some("web"));
        assert_eq!(request.resource_version.as_deref(), Some("7"));
        assert_eq!(request.spec.workload["image"], json!("nginx:1.25"));
        assert_eq!(request.spec.volumes.len(), 1);
        assert_eq!(request.plugins.len(), 1);
        assert!(!request.spec.workload.contains_key("plugins"));
        assert!(!request.spec.workload.contains_key("resourceVersion"));
    }

    #[test]
    fn test_unnamed_claims_are_generated() {
        let translated = translator()
            .translate(
                "shop",
                None,
                request(
                    Some("web"),
                    vec![
                        Volume::claim("/data", "1Gi"),
                        Volume::claim("/cache", "512Mi"),
                    ],
                ),
            )
            .unwrap();

        let component = translated.component;
        assert_eq!(component.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(component.spec.volumes[0].claim_name, "pvc-web-1700000000-0");
        assert_eq!(component.spec.volumes[1].claim_name, "pvc-web-1700000000-1");
    }

    #[test]
    fn test_named_claims_and_other_volumes_pass_through() {
        let mut named = Volume::claim("/data", "1Gi");
        named.claim_name = "existing-claim".into();
        let scratch = Volume {
            volume_type: VolumeType::TemporaryDisk,
            path: "/tmp".into(),
            host_path: None,
            size: None,
            storage_class_name: None,
            claim_name: String::new(),
        };

        let translated = translator()
            .translate("shop", None, request(Some("web"), vec![named, scratch]))
            .unwrap();

        assert_eq!(translated.component.spec.volumes[0].claim_name, "existing-claim");
        assert!(translated.component.spec.volumes[1].claim_name.is_empty());
    }

    #[test]
    fn test_retranslation_keeps_claim_names() {
        let translator = ComponentTranslator::new(Arc::new(TimestampClaimNames));
        let first = translator
            .translate("shop", None, request(Some("web"), vec![Volume::claim("/data", "1Gi")]))
            .unwrap();
        let claim = first.component.spec.volumes[0].claim_name.clone();
        assert!(parse_claim_name(&claim).is_some());

        let resubmitted = ComponentRequest {
            name: Some("web".into()),
            resource_version: None,
            plugins: vec![],
            spec: first.component.spec.clone(),
        };
        let second = translator.translate("shop", None, resubmitted).unwrap();
        assert_eq!(second.component.spec.volumes[0].claim_name, claim);
    }

    #[test]
    fn test_route_name_wins() {
        let translated = translator()
            .translate("shop", Some("web"), request(Some("other"), vec![]))
            .unwrap();
        assert_eq!(translated.component.metadata.name.as_deref(), Some("web"));

        let translated = translator()
            .translate("shop", Some(""), request(Some("api"), vec![]))
            .unwrap();
        assert_eq!(translated.component.metadata.name.as_deref(), Some("api"));
    }

    #[test]
    fn test_validation_errors() {
        let t = translator();

        assert_matches!(
            t.translate("", None, request(Some("web"), vec![])),
            Err(Error::Validation(_))
        );
        assert_matches!(t.translate("shop", None, request(None, vec![])), Err(Error::Validation(_)));
        assert_matches!(
            t.translate("shop", None, request(Some("Web_1"), vec![])),
            Err(Error::Validation(_))
        );

        let mut duplicated = request(Some("web"), vec![]);
        duplicated.plugins = vec![
            PluginSpec::new("liveness").with_config(json!({"a": 1})),
            PluginSpec::new("liveness").with_config(json!({"a": 2})),
        ];
        assert_matches!(t.translate("shop", None, duplicated), Err(Error::Validation(_)));

        let mut unnamed = request(Some("web"), vec![]);
        unnamed.plugins = vec![PluginSpec::new("")];
        assert_matches!(t.translate("shop", None, unnamed), Err(Error::Validation(_)));
    }
}
