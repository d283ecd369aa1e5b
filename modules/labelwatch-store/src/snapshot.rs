use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use labelwatch_common::AddressReport;
use tracing::{info, warn};

use crate::botdb::{BotDbClient, Scope};
use crate::error::{Result, StoreError};

/// Serialized local cache: address → report.
pub type Snapshot = HashMap<String, AddressReport>;

const SNAPSHOT_OBJECT: &str = "labels.json";

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Remote snapshot; an absent snapshot is empty.
    async fn load(&self) -> Result<Snapshot>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

pub struct BotDbSnapshotStore {
    db: Arc<BotDbClient>,
}

impl BotDbSnapshotStore {
    pub fn new(db: Arc<BotDbClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SnapshotStore for BotDbSnapshotStore {
    async fn load(&self) -> Result<Snapshot> {
        match self.db.get(Scope::Bot, SNAPSHOT_OBJECT).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(StoreError::NotFound(_)) => {
                warn!("No cache snapshot found, starting a new one");
                Ok(Snapshot::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let raw = serde_json::to_vec(snapshot)?;
        info!(entries = snapshot.len(), bytes = raw.len(), "Saving cache snapshot");
        self.db.put(Scope::Bot, SNAPSHOT_OBJECT, raw).await
    }
}
