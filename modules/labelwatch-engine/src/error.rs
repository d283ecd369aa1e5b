use labelwatch_store::StoreError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Faults that fail a whole batch. Transient fetch, store and duplicate-check
/// errors never surface here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Address producer failed: {0}")]
    Producer(String),

    #[error("Snapshot sync failed: {0}")]
    Snapshot(#[from] StoreError),
}
