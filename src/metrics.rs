//! Orchestrator Metrics
//!
//! Prometheus counters for synchronization flows and binding sub-operations.

use crate::error::Result;
use prometheus::{IntCounterVec, Opts, Registry};

/// Counters recorded by the synchronizer and the binding reconciler
#[derive(Clone)]
pub struct SyncMetrics {
    /// Completed flows by `flow` (create/update/delete) and `outcome`
    pub flows: IntCounterVec,
    /// Binding sub-operations by `operation` and `outcome`
    pub binding_operations: IntCounterVec,
}

impl SyncMetrics {
    /// Create unregistered counters
    pub fn new() -> Self {
        let flows = IntCounterVec::new(
            Opts::new(
                "component_sync_flows_total",
                "Component synchronization flows by flow and outcome",
            ),
            &["flow", "outcome"],
        )
        .expect("static metric definition is valid");

        let binding_operations = IntCounterVec::new(
            Opts::new(
                "plugin_binding_operations_total",
                "Plugin binding sub-operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("static metric definition is valid");

        Self {
            flows,
            binding_operations,
        }
    }

    /// Register the counters with a registry
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.flows.clone()))?;
        registry.register(Box::new(self.binding_operations.clone()))?;
        Ok(())
    }

    /// Record the outcome of a flow
    pub fn record_flow<T>(&self, flow: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => e.class().as_str(),
        };
        self.flows.with_label_values(&[flow, outcome]).inc();
    }

    /// Record the outcome of a binding sub-operation
    pub fn record_binding(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.binding_operations
            .with_label_values(&[operation, outcome])
            .inc();
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}
