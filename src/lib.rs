//! Component Orchestrator
//!
//! Keeps application components and their plugin bindings in a Kubernetes
//! control plane consistent with what clients submit.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      REST API (axum)                         │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │                   Component Synchronizer                     │
//! │   Translator ──▶ Component store write ──▶ Binding Reconciler│
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │                 ObjectStore<K> (domain port)                 │
//! │   ┌────────────────────────┐   ┌──────────────────────────┐  │
//! │   │  KubeStore (kube::Api) │   │  MemoryStore (DashMap)   │  │
//! │   └────────────────────────┘   └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST router and server
//! - [`crd`]: Component and ComponentPluginBinding resources
//! - [`domain`]: Store port and label selectors
//! - [`error`]: Error types and classification
//! - [`metrics`]: Prometheus counters
//! - [`response`]: Detailed component views
//! - [`store`]: Cluster and in-memory stores
//! - [`sync`]: Translation, synchronization and binding reconciliation

pub mod api;
pub mod crd;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod response;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};

pub use crd::{
    Component, ComponentPluginBinding, ComponentPluginBindingSpec, ComponentSpec, PluginIdentity,
    PluginSpec, Volume, VolumeType, COMPONENT_LABEL,
};

pub use domain::ports::{LabelSelector, ObjectStore};

pub use error::{Error, ErrorClass, Result};

pub use metrics::SyncMetrics;

pub use response::{ComponentDetails, ResponseBuilder};

pub use store::{KubeStore, MemoryStore};

pub use sync::{
    ComponentRequest, ComponentSynchronizer, ComponentTranslator, PluginBindingReconciler,
    ReconcileSummary, SyncOutcome, TimestampClaimNames,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
