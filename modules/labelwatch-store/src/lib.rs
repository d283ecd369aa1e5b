pub mod botdb;
pub mod error;
pub mod label_api;
pub mod labels;
pub mod postgres;
pub mod secrets;
pub mod snapshot;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use botdb::{BotDbClient, Scope};
pub use error::{Result, StoreError};
pub use label_api::{ExistingLabel, LabelApi, LabelApiClient, LabelFilter};
pub use labels::{LabelKeys, LabelRecord, LabelStore, MemoryLabelStore};
pub use postgres::PgLabelStore;
pub use secrets::{load_with_retry, Secrets, SecretsSource};
pub use snapshot::{BotDbSnapshotStore, Snapshot, SnapshotStore};
