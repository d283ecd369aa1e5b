//! Structured lifecycle events emitted by the engine.
//!
//! Components receive an [`EventSink`] instead of logging directly, so tests
//! can observe exactly what happened to every address and label.

use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSource {
    Store,
    LabelApi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    NoExtractor {
        addresses: usize,
    },
    BatchStarted {
        addresses: usize,
        workers: usize,
    },
    CacheHit {
        address: String,
    },
    RemoteKnown {
        address: String,
    },
    Scanned {
        address: String,
        tags: usize,
        has_name: bool,
        pages_fetched: usize,
        pages_failed: usize,
    },
    Unreachable {
        address: String,
        pages_failed: usize,
    },
    DuplicateSuppressed {
        entity: String,
        label: String,
        source: DuplicateSource,
    },
    DuplicateCheckFailedOpen {
        entity: String,
        label: String,
        remaining: usize,
        error: String,
    },
    StoreError {
        operation: &'static str,
        entity: String,
        error: String,
    },
    BatchFinished {
        added: usize,
        duplicates: usize,
    },
    BatchFailed {
        error: String,
    },
    SnapshotSynced {
        entries: usize,
    },
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: EngineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: EngineEvent) {
        match event {
            EngineEvent::NoExtractor { addresses } => {
                debug!(addresses, "No extractor for this chain, nothing to check")
            }
            EngineEvent::BatchStarted { addresses, workers } => {
                info!(addresses, workers, "Evaluating batch")
            }
            EngineEvent::CacheHit { address } => debug!(address = %address, "Cache hit"),
            EngineEvent::RemoteKnown { address } => {
                debug!(address = %address, "Entity already recorded, skipping scan")
            }
            EngineEvent::Scanned {
                address,
                tags,
                has_name,
                pages_fetched,
                pages_failed,
            } => {
                if tags > 0 || has_name {
                    info!(address = %address, tags, has_name, pages_fetched, pages_failed, "Found labels");
                } else {
                    debug!(address = %address, pages_fetched, pages_failed, "Scanned, nothing found");
                }
            }
            EngineEvent::Unreachable {
                address,
                pages_failed,
            } => warn!(address = %address, pages_failed, "Every page failed, not caching"),
            EngineEvent::DuplicateSuppressed {
                entity,
                label,
                source,
            } => info!(entity = %entity, label = %label, ?source, "Label already exists (avoiding duplicate)"),
            EngineEvent::DuplicateCheckFailedOpen {
                entity,
                label,
                remaining,
                error,
            } => error!(
                entity = %entity,
                label = %label,
                remaining,
                error = %error,
                "Error getting labels for duplicate detection (ignoring to avoid downtime)"
            ),
            EngineEvent::StoreError {
                operation,
                entity,
                error,
            } => warn!(operation, entity = %entity, error = %error, "Label store error (continuing)"),
            EngineEvent::BatchFinished { added, duplicates } => {
                info!(added, duplicates, "Batch finished")
            }
            EngineEvent::BatchFailed { error } => error!(error = %error, "Batch failed"),
            EngineEvent::SnapshotSynced { entries } => info!(entries, "Synced cache snapshot"),
        }
    }
}
