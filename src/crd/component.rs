//! Component CRD
//!
//! A Component is a named workload declared inside an application namespace.
//! The orchestrator only interprets its volumes; the rest of the workload
//! specification (image, ports, env, replicas, ...) is carried through opaquely.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// Component CRD
// =============================================================================

/// Component describes one deployable workload of an application.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.kalm.dev",
    version = "v1alpha1",
    kind = "Component",
    plural = "components",
    shortname = "comp",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Image", "type": "string", "jsonPath": ".spec.image"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Volumes mounted into the workload
    #[serde(default)]
    pub volumes: Vec<Volume>,

    /// Remaining workload fields, preserved as submitted
    #[serde(flatten)]
    pub workload: BTreeMap<String, Value>,
}

impl ComponentSpec {
    /// Persistent-claim volumes of this spec
    pub fn claim_volumes(&self) -> impl Iterator<Item = &Volume> {
        self.volumes
            .iter()
            .filter(|v| v.volume_type == VolumeType::PersistentVolumeClaim)
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// A volume attached to a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Kind of backing storage
    #[serde(rename = "type")]
    pub volume_type: VolumeType,

    /// Mount path inside the container
    #[serde(default)]
    pub path: String,

    /// Host directory, for hostpath volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,

    /// Requested size (e.g. "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Storage class used when the claim is provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    /// Name of the backing PersistentVolumeClaim. Generated when empty.
    #[serde(default, alias = "pvc", skip_serializing_if = "String::is_empty")]
    pub claim_name: String,
}

impl Volume {
    /// Create a persistent-claim volume without a claim name
    pub fn claim(path: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            volume_type: VolumeType::PersistentVolumeClaim,
            path: path.into(),
            host_path: None,
            size: Some(size.into()),
            storage_class_name: None,
            claim_name: String::new(),
        }
    }

    /// True for persistent-claim volumes that still need a claim name
    pub fn needs_claim_name(&self) -> bool {
        self.volume_type == VolumeType::PersistentVolumeClaim && self.claim_name.is_empty()
    }
}

/// Volume kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum VolumeType {
    #[serde(rename = "emptyDirMemory")]
    TemporaryMemory,
    #[serde(rename = "emptyDir")]
    TemporaryDisk,
    #[serde(rename = "pvc")]
    PersistentVolumeClaim,
    #[serde(rename = "hostpath")]
    HostPath,
    #[serde(rename = "pvc-template")]
    PersistentVolumeClaimTemplate,
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeType::TemporaryMemory => write!(f, "emptyDirMemory"),
            VolumeType::TemporaryDisk => write!(f, "emptyDir"),
            VolumeType::PersistentVolumeClaim => write!(f, "pvc"),
            VolumeType::HostPath => write!(f, "hostpath"),
            VolumeType::PersistentVolumeClaimTemplate => write!(f, "pvc-template"),
        }
    }
}
