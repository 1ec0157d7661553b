//! Component Synchronization
//!
//! Translation of client descriptions, the create/update/delete flows against
//! the component store, and reconciliation of the plugin bindings that hang
//! off each component.

pub mod claim_name;
pub mod reconciler;
pub mod synchronizer;
pub mod translator;

#[cfg(test)]
pub(crate) mod testing;

pub use claim_name::{ClaimNameGenerator, TimestampClaimNames};
pub use reconciler::{plan_bindings, PluginBindingReconciler, ReconcilePlan, ReconcileSummary};
pub use synchronizer::{ComponentSynchronizer, SyncOutcome};
pub use translator::{ComponentRequest, ComponentTranslator, Translated};

use crate::error::{Error, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless `cancel` fires first; the future is dropped on cancellation
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
