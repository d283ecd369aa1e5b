pub mod agent;
pub mod cache;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod events;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use agent::Agent;
pub use cache::ReportCache;
pub use dedup::{Classified, DuplicateFilter};
pub use engine::{worker_count, AddressOutcome, BatchOutcome, EngineSettings, Evaluator, EvaluatorDeps};
pub use error::{EngineError, Result};
pub use events::{DuplicateSource, EngineEvent, EventSink, TracingSink};
