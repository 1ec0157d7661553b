//! ComponentPluginBinding CRD
//!
//! Attaches one plugin configuration to one component. Bindings are stored
//! as independent objects next to the component and found through the
//! [`COMPONENT_LABEL`] index rather than embedded in the component itself.

use kube::CustomResource;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Label carrying the owning component's name on every binding
pub const COMPONENT_LABEL: &str = "core.kalm.dev/component";

// =============================================================================
// ComponentPluginBinding CRD
// =============================================================================

/// ComponentPluginBinding binds a plugin, with its configuration, to a component.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.kalm.dev",
    version = "v1alpha1",
    kind = "ComponentPluginBinding",
    plural = "componentpluginbindings",
    shortname = "cpb",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Component", "type": "string", "jsonPath": ".spec.componentName"}"#,
    printcolumn = r#"{"name": "Plugin", "type": "string", "jsonPath": ".spec.pluginName"}"#,
    printcolumn = r#"{"name": "Disabled", "type": "boolean", "jsonPath": ".spec.isDisabled"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPluginBindingSpec {
    /// Name of the bound component
    pub component_name: String,

    /// Plugin name
    pub plugin_name: String,

    /// Plugin kind; empty for untyped plugins
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plugin_kind: String,

    /// Plugin configuration payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "free_form_object")]
    pub config: Option<Value>,

    /// Keep the binding but stop applying the plugin
    #[serde(default)]
    pub is_disabled: bool,
}

impl ComponentPluginBindingSpec {
    /// Build the binding spec for `plugin` attached to `component_name`
    pub fn for_plugin(component_name: &str, plugin: &PluginSpec) -> Self {
        Self {
            component_name: component_name.to_string(),
            plugin_name: plugin.name.clone(),
            plugin_kind: plugin.kind.clone(),
            config: plugin.config.clone(),
            is_disabled: plugin.is_disabled,
        }
    }

    /// Identity of the bound plugin
    pub fn identity(&self) -> PluginIdentity {
        PluginIdentity::new(&self.plugin_kind, &self.plugin_name)
    }

    /// The plugin as a client would submit it
    pub fn to_plugin(&self) -> PluginSpec {
        PluginSpec {
            name: self.plugin_name.clone(),
            kind: self.plugin_kind.clone(),
            config: self.config.clone(),
            is_disabled: self.is_disabled,
        }
    }
}

/// Structural schema for an opaque JSON object the API server must not prune
fn free_form_object(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema
        .extensions
        .insert("x-kubernetes-preserve-unknown-fields".into(), Value::Bool(true));
    schema.extensions.insert("nullable".into(), Value::Bool(true));
    Schema::Object(schema)
}

// =============================================================================
// Plugin Types
// =============================================================================

/// A plugin as submitted alongside a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    #[serde(default)]
    pub is_disabled: bool,
}

impl PluginSpec {
    /// Create an untyped plugin with no configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: String::new(),
            config: None,
            is_disabled: false,
        }
    }

    /// Set the plugin kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the configuration payload
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Identity used for matching against stored bindings
    pub fn identity(&self) -> PluginIdentity {
        PluginIdentity::new(&self.kind, &self.name)
    }
}

/// Plugin identity: (kind, name). Configuration never takes part in matching.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginIdentity {
    pub kind: String,
    pub name: String,
}

impl PluginIdentity {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.kind, self.name)
        }
    }
}

/// Longest object name the binding store accepts (DNS-1123 label)
const MAX_OBJECT_NAME_LEN: usize = 63;

/// Hex digits of the identity hash appended to every binding name
const NAME_HASH_LEN: usize = 10;

/// Deterministic object name for a component's binding of `plugin`
///
/// A readable prefix (lower-cased, anything outside `[a-z0-9-]` replaced by
/// `-`, truncated to fit) followed by a hash of the exact
/// `(component, kind, name)` triple. Distinct triples that sanitize to the
/// same prefix still get distinct names.
pub fn binding_object_name(component_name: &str, plugin: &PluginIdentity) -> String {
    let raw = if plugin.kind.is_empty() {
        format!("{}-{}", component_name, plugin.name)
    } else {
        format!("{}-{}-{}", component_name, plugin.kind, plugin.name)
    };

    let sanitized: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();

    let budget = MAX_OBJECT_NAME_LEN - NAME_HASH_LEN - 1;
    let prefix = sanitized.trim_matches('-');
    let prefix = prefix[..prefix.len().min(budget)].trim_end_matches('-');
    let prefix = if prefix.is_empty() { "binding" } else { prefix };

    format!("{}-{}", prefix, identity_hash(component_name, plugin))
}

fn identity_hash(component_name: &str, plugin: &PluginIdentity) -> String {
    let mut hasher = Sha256::new();
    for field in [component_name, plugin.kind.as_str(), plugin.name.as_str()] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..NAME_HASH_LEN].to_string()
}
