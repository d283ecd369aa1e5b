//! Durable record of every (entity, label) pair the bot has emitted.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use labelwatch_common::clean_text;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};

/// Namespace segment shared by every item id this bot writes.
const SOURCE_NAMESPACE: &str = "etherscan-labels";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub item_id: String,
    pub sort_key: String,
    pub entity: String,
    pub label: String,
}

#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Whether any label was ever recorded for `entity`.
    async fn entity_exists(&self, entity: &str) -> Result<bool>;

    async fn get_label(&self, entity: &str, label: &str) -> Result<Option<LabelRecord>>;

    /// Insert-only. Recording an existing pair again is a no-op.
    async fn put_label(&self, entity: &str, label: &str) -> Result<()>;
}

/// Composite key scheme: `bot|namespace|entity`, prefixed with the chain id
/// for every chain except mainnet.
#[derive(Debug, Clone)]
pub struct LabelKeys {
    chain_id: u64,
    bot_id: String,
}

impl LabelKeys {
    pub fn new(chain_id: u64, bot_id: &str) -> Result<Self> {
        if bot_id.trim().is_empty() {
            return Err(StoreError::InvalidConfig("bot id is empty".to_string()));
        }
        if chain_id == 0 {
            return Err(StoreError::InvalidConfig("chain id is 0".to_string()));
        }
        Ok(Self {
            chain_id,
            bot_id: bot_id.to_string(),
        })
    }

    pub fn item_id(&self, entity: &str) -> String {
        let id = clean_text(&format!("{}|{SOURCE_NAMESPACE}|{}", self.bot_id, entity));
        if self.chain_id == 1 {
            id
        } else {
            format!("{}|{id}", self.chain_id)
        }
    }

    pub fn sort_key(&self, label: &str) -> String {
        clean_text(label)
    }

    pub fn record(&self, entity: &str, label: &str) -> LabelRecord {
        LabelRecord {
            item_id: self.item_id(entity),
            sort_key: self.sort_key(label),
            entity: clean_text(entity),
            label: clean_text(label),
        }
    }
}

/// In-process [`LabelStore`] with the same key scheme as the Postgres store.
pub struct MemoryLabelStore {
    keys: LabelKeys,
    items: Mutex<HashMap<String, BTreeMap<String, LabelRecord>>>,
    failing: AtomicBool,
    get_calls: AtomicUsize,
}

impl MemoryLabelStore {
    pub fn new(keys: LabelKeys) -> Self {
        Self {
            keys,
            items: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Make every call fail until reset, simulating an unreachable store.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_label_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Every stored record, ordered by item id then sort key.
    pub async fn records(&self) -> Vec<LabelRecord> {
        let items = self.items.lock().await;
        let mut records: Vec<LabelRecord> = items
            .values()
            .flat_map(|labels| labels.values().cloned())
            .collect();
        records.sort_by(|a, b| (&a.item_id, &a.sort_key).cmp(&(&b.item_id, &b.sort_key)));
        records
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LabelStore for MemoryLabelStore {
    async fn entity_exists(&self, entity: &str) -> Result<bool> {
        self.check_available()?;
        let items = self.items.lock().await;
        Ok(items
            .get(&self.keys.item_id(entity))
            .is_some_and(|labels| !labels.is_empty()))
    }

    async fn get_label(&self, entity: &str, label: &str) -> Result<Option<LabelRecord>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let items = self.items.lock().await;
        Ok(items
            .get(&self.keys.item_id(entity))
            .and_then(|labels| labels.get(&self.keys.sort_key(label)))
            .cloned())
    }

    async fn put_label(&self, entity: &str, label: &str) -> Result<()> {
        self.check_available()?;
        let record = self.keys.record(entity, label);
        let mut items = self.items.lock().await;
        items
            .entry(record.item_id.clone())
            .or_default()
            .entry(record.sort_key.clone())
            .or_insert(record);
        Ok(())
    }
}
