//! Duplicate suppression for proposed labels.
//!
//! Checks run cheapest first: the durable store, then the public label
//! service one label at a time. Every failure fails open.

use std::sync::Arc;

use labelwatch_common::LabelPair;
use labelwatch_store::{LabelApi, LabelFilter, LabelStore};

use crate::events::{DuplicateSource, EngineEvent, EventSink};

/// Proposed labels split into those to emit and those already emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub added: Vec<LabelPair>,
    pub duplicates: Vec<LabelPair>,
}

#[derive(Clone)]
pub struct DuplicateFilter {
    store: Arc<dyn LabelStore>,
    label_api: Arc<dyn LabelApi>,
    source_id: String,
    sink: Arc<dyn EventSink>,
}

impl DuplicateFilter {
    pub fn new(
        store: Arc<dyn LabelStore>,
        label_api: Arc<dyn LabelApi>,
        source_id: &str,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            label_api,
            source_id: source_id.to_string(),
            sink,
        }
    }

    /// Classify each proposed label in order. If the label service errors,
    /// that label and everything after it are treated as new.
    pub async fn classify(&self, proposed: Vec<LabelPair>) -> Classified {
        let mut out = Classified::default();
        let mut pending = proposed.into_iter();

        while let Some(pair) = pending.next() {
            if self.recorded_in_store(&pair).await {
                self.sink.record(EngineEvent::DuplicateSuppressed {
                    entity: pair.entity.clone(),
                    label: pair.label.clone(),
                    source: DuplicateSource::Store,
                });
                out.duplicates.push(pair);
                continue;
            }

            let filter = LabelFilter::single(&self.source_id, &pair.entity, &pair.label);
            match self.label_api.get_labels(&filter).await {
                Ok(existing) if !existing.is_empty() => {
                    self.sink.record(EngineEvent::DuplicateSuppressed {
                        entity: pair.entity.clone(),
                        label: pair.label.clone(),
                        source: DuplicateSource::LabelApi,
                    });
                    // remember it so the store answers next time
                    self.put(&pair).await;
                    out.duplicates.push(pair);
                }
                Ok(_) => out.added.push(pair),
                Err(e) => {
                    self.sink.record(EngineEvent::DuplicateCheckFailedOpen {
                        entity: pair.entity.clone(),
                        label: pair.label.clone(),
                        remaining: pending.len() + 1,
                        error: e.to_string(),
                    });
                    out.added.push(pair);
                    out.added.extend(pending.by_ref());
                    break;
                }
            }
        }

        out
    }

    /// Record every emitted label in the durable store.
    pub async fn persist(&self, added: &[LabelPair]) {
        for pair in added {
            self.put(pair).await;
        }
    }

    async fn recorded_in_store(&self, pair: &LabelPair) -> bool {
        match self.store.get_label(&pair.entity, &pair.label).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                self.sink.record(EngineEvent::StoreError {
                    operation: "get_label",
                    entity: pair.entity.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    async fn put(&self, pair: &LabelPair) {
        if let Err(e) = self.store.put_label(&pair.entity, &pair.label).await {
            self.sink.record(EngineEvent::StoreError {
                operation: "put_label",
                entity: pair.entity.clone(),
                error: e.to_string(),
            });
        }
    }
}
