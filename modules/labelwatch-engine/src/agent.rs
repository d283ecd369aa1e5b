//! Host hooks: initialize, per-block and per-transaction evaluation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use labelwatch_common::protocol::{
    BlockEvent, EntityType, EvaluateResponse, Finding, FindingType, Label, Severity,
    TransactionEvent,
};
use labelwatch_common::{parse_chain_id, summarize_by_entity, LabelPair};
use labelwatch_store::SnapshotStore;
use tokio::sync::Mutex;

use crate::engine::{BatchOutcome, Evaluator};
use crate::error::Result;
use crate::events::EngineEvent;

pub const ALERT_ID: &str = "risky-address-label";
pub const STARTED_ALERT_ID: &str = "risky-address-label-started";

struct SnapshotSync {
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
}

#[derive(Default)]
struct AgentState {
    started: bool,
    last_sync: Option<Instant>,
}

pub struct Agent {
    evaluator: Evaluator,
    chain_id: u64,
    snapshot: Option<SnapshotSync>,
    state: Mutex<AgentState>,
}

impl Agent {
    pub fn new(evaluator: Evaluator, chain_id: u64) -> Self {
        Self {
            evaluator,
            chain_id,
            snapshot: None,
            state: Mutex::new(AgentState::default()),
        }
    }

    /// Reconcile the local cache with a shared snapshot at most once per `interval`.
    pub fn with_snapshot(mut self, store: Arc<dyn SnapshotStore>, interval: Duration) -> Self {
        self.snapshot = Some(SnapshotSync { store, interval });
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub async fn initialize(&self) -> EvaluateResponse {
        match self.sync_snapshot(true).await {
            Ok(()) => EvaluateResponse::success(Vec::new(), BTreeMap::new()),
            Err(e) => EvaluateResponse::error(e.to_string()),
        }
    }

    pub async fn evaluate_block(&self, event: &BlockEvent) -> EvaluateResponse {
        if let Some(early) = self.chain_gate(&event.network.chain_id) {
            return early;
        }
        if let Err(e) = self.sync_snapshot(false).await {
            return EvaluateResponse::error(e.to_string());
        }

        let mut state = self.state.lock().await;
        let findings = if state.started {
            Vec::new()
        } else {
            state.started = true;
            vec![started_finding()]
        };
        EvaluateResponse::success(findings, BTreeMap::new())
    }

    pub async fn evaluate_tx(&self, event: &TransactionEvent) -> EvaluateResponse {
        if let Some(early) = self.chain_gate(&event.network.chain_id) {
            return early;
        }

        let addresses = event.addresses.keys().map(|a| a.to_lowercase());
        match self.evaluator.evaluate_batch(addresses).await {
            Ok(outcome) => {
                let metadata = batch_metadata(&outcome);
                let findings = risky_address_finding(&outcome, &metadata)
                    .into_iter()
                    .collect();
                EvaluateResponse::success(findings, metadata)
            }
            Err(e) => EvaluateResponse::error(e.to_string()),
        }
    }

    /// Response that ends a hook early: an error for a malformed chain id,
    /// an empty success for another chain. `None` means the chain is served.
    fn chain_gate(&self, raw: &str) -> Option<EvaluateResponse> {
        match parse_chain_id(raw) {
            Ok(id) if id == self.chain_id => None,
            Ok(_) => Some(EvaluateResponse::success(Vec::new(), BTreeMap::new())),
            Err(e) => Some(EvaluateResponse::error(e.to_string())),
        }
    }

    async fn sync_snapshot(&self, force: bool) -> Result<()> {
        let Some(sync) = &self.snapshot else {
            return Ok(());
        };

        let mut state = self.state.lock().await;
        let due = match state.last_sync {
            Some(last) => force || last.elapsed() >= sync.interval,
            None => true,
        };
        if !due {
            return Ok(());
        }

        let entries = self.evaluator.cache().reconcile(sync.store.as_ref()).await?;
        state.last_sync = Some(Instant::now());
        self.evaluator
            .sink()
            .record(EngineEvent::SnapshotSynced { entries });
        Ok(())
    }
}

/// `added` / `duplicates` as JSON objects of `address → "l1|l2"`, plus a timestamp.
pub fn batch_metadata(outcome: &BatchOutcome) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("added".to_string(), summary_json(&outcome.added));
    metadata.insert("duplicates".to_string(), summary_json(&outcome.duplicates));
    metadata.insert(
        "timestamp".to_string(),
        labelwatch_common::protocol::timestamp_now(),
    );
    metadata
}

fn summary_json(labels: &[LabelPair]) -> String {
    serde_json::to_string(&summarize_by_entity(labels)).unwrap_or_else(|_| "{}".to_string())
}

fn risky_address_finding(
    outcome: &BatchOutcome,
    metadata: &BTreeMap<String, String>,
) -> Option<Finding> {
    if outcome.added.is_empty() {
        return None;
    }

    let labels = outcome
        .added
        .iter()
        .map(|pair| Label {
            entity_type: EntityType::Address,
            entity: pair.entity.clone(),
            confidence: 1.0,
            label: pair.label.clone(),
        })
        .collect();

    Some(Finding {
        protocol: "ethereum".to_string(),
        severity: Severity::High,
        finding_type: FindingType::Suspicious,
        alert_id: ALERT_ID.to_string(),
        name: "Risky Address".to_string(),
        description: format!(
            "risky address, {} new, {} dupes",
            outcome.added.len(),
            outcome.duplicates.len()
        ),
        metadata: metadata.clone(),
        labels,
    })
}

fn started_finding() -> Finding {
    Finding {
        protocol: "ethereum".to_string(),
        severity: Severity::Info,
        finding_type: FindingType::Info,
        alert_id: STARTED_ALERT_ID.to_string(),
        name: "Risky Address Label Bot Started".to_string(),
        description: "bot started".to_string(),
        metadata: BTreeMap::new(),
        labels: Vec::new(),
    }
}
