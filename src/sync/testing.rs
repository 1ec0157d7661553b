//! Test doubles shared by the sync tests

use super::claim_name::{format_claim_name, ClaimNameGenerator};
use crate::domain::ports::{LabelSelector, ObjectStore};
use crate::error::{Error, Result};
use crate::store::{MemoryStore, StoredObject};
use async_trait::async_trait;
use kube::ResourceExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Claim names with a fixed second and a counting suffix
#[derive(Default)]
pub(crate) struct SequentialClaimNames(AtomicU32);

impl ClaimNameGenerator for SequentialClaimNames {
    fn generate(&self, component_name: &str) -> String {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        format_claim_name(component_name, 1_700_000_000, n)
    }
}

/// Wraps a MemoryStore, counting writes and injecting faults
pub(crate) struct RecordingStore<K> {
    pub inner: Arc<MemoryStore<K>>,
    failing: Mutex<HashSet<String>>,
    fail_list: AtomicBool,
    stall: AtomicBool,
    cancel_on_write: Mutex<Option<CancellationToken>>,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl<K: StoredObject> RecordingStore<K> {
    pub fn new(inner: Arc<MemoryStore<K>>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            fail_list: AtomicBool::new(false),
            stall: AtomicBool::new(false),
            cancel_on_write: Mutex::new(None),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Make every write to `name` fail with a transport error
    pub fn fail_writes_to(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Park every later write forever, as a hung API server would
    pub fn stall_writes(&self) {
        self.stall.store(true, Ordering::SeqCst);
    }

    /// Cancel `token` once a create or update has been committed
    pub fn cancel_after_write(&self, token: CancellationToken) {
        *self.cancel_on_write.lock() = Some(token);
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
        self.fail_lists(false);
    }

    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.creates.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    async fn check(&self, name: &str) -> Result<()> {
        if self.stall.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.failing.lock().contains(name) {
            Err(Error::Transport(format!("injected failure for {}", name)))
        } else {
            Ok(())
        }
    }

    fn committed(&self, result: Result<K>) -> Result<K> {
        if result.is_ok() {
            if let Some(token) = self.cancel_on_write.lock().as_ref() {
                token.cancel();
            }
        }
        result
    }
}

#[async_trait]
impl<K: StoredObject> ObjectStore<K> for RecordingStore<K> {
    async fn create(&self, object: &K) -> Result<K> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check(&object.name_any()).await?;
        self.committed(self.inner.create(object).await)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.inner.get(namespace, name).await
    }

    async fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<K>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected list failure".into()));
        }
        self.inner.list(namespace, selector).await
    }

    async fn update(&self, object: &K) -> Result<K> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check(&object.name_any()).await?;
        self.committed(self.inner.update(object).await)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check(name).await?;
        self.inner.delete(namespace, name).await
    }
}
