// Test doubles for the duplicate-check collaborators.
//
// - MockLabelApi (LabelApi): fixed set of known labels, records every call,
//   can be told to fail from the Nth call on
// - MemorySnapshotStore (SnapshotStore): snapshot held in memory

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::label_api::{ExistingLabel, LabelApi, LabelFilter};
use crate::snapshot::{Snapshot, SnapshotStore};

#[derive(Default)]
pub struct MockLabelApi {
    known: HashSet<(String, String)>,
    fail_from_call: Option<usize>,
    calls: Mutex<Vec<LabelFilter>>,
    count: AtomicUsize,
}

impl MockLabelApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `(entity, label)` as already emitted.
    pub fn with_label(mut self, entity: &str, label: &str) -> Self {
        self.known.insert((entity.to_string(), label.to_string()));
        self
    }

    /// Fail the `n`th call (1-based) and every call after it.
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_from_call = Some(n);
        self
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub async fn calls(&self) -> Vec<LabelFilter> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LabelApi for MockLabelApi {
    async fn get_labels(&self, filter: &LabelFilter) -> Result<Vec<ExistingLabel>> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().await.push(filter.clone());

        if self.fail_from_call.is_some_and(|from| n >= from) {
            return Err(StoreError::Api {
                status: 503,
                message: "MockLabelApi: unavailable".to_string(),
            });
        }

        let mut found = Vec::new();
        for entity in &filter.entities {
            for label in &filter.labels {
                if self.known.contains(&(entity.clone(), label.clone())) {
                    found.push(ExistingLabel {
                        entity: entity.clone(),
                        label: label.clone(),
                    });
                }
            }
        }
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Snapshot>,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            saves: AtomicUsize::new(0),
        }
    }

    pub async fn current(&self) -> Snapshot {
        self.snapshot.lock().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().await = snapshot.clone();
        Ok(())
    }
}
