//! Custom Resource Definitions for the Component Orchestrator
//!
//! This module contains all CRD types:
//! - Component: a workload declared inside an application namespace
//! - ComponentPluginBinding: one plugin attached to one component

pub mod component;
pub mod plugin_binding;

pub use component::*;
pub use plugin_binding::*;

use kube::CustomResourceExt;

/// Render every CRD this crate owns as a multi-document YAML stream
pub fn crds_yaml() -> crate::Result<String> {
    let docs = [Component::crd(), ComponentPluginBinding::crd()];
    let mut out = String::new();

    for crd in docs.iter() {
        let doc = serde_yaml::to_string(crd)
            .map_err(|e| crate::Error::Internal(format!("CRD serialization failed: {}", e)))?;
        out.push_str("---\n");
        out.push_str(&doc);
    }

    Ok(out)
}
