//! Batch evaluation: a bounded worker pool over the addresses of one
//! transaction, followed by a single duplicate-filter pass.
//!
//! Per address: `Unchecked → CacheHit | RemoteKnown | Scanned → Committed`.
//! Nothing is retried inside a batch; an address that could not be scanned
//! is simply looked at again the next time it shows up.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use labelwatch_common::{AddressReport, LabelPair};
use labelwatch_scanner::{Extractor, PageFetcher, Scanner};
use labelwatch_store::{LabelApi, LabelStore};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::cache::{ReportCache, DEFAULT_TTL_HOURS};
use crate::dedup::{Classified, DuplicateFilter};
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventSink};

pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Workers for a batch: never more than the batch has addresses.
pub fn worker_count(max_workers: usize, addresses: usize) -> usize {
    max_workers.min(addresses)
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub max_workers: usize,
    pub cache_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            cache_ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }
}

/// Collaborators of the evaluator. `extractor` is `None` for chains without
/// a known explorer, which turns every batch into a no-op.
pub struct EvaluatorDeps {
    pub extractor: Option<Arc<dyn Extractor>>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub store: Arc<dyn LabelStore>,
    pub label_api: Arc<dyn LabelApi>,
    pub sink: Arc<dyn EventSink>,
    pub bot_id: String,
}

/// What became of one address in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressOutcome {
    CacheHit(AddressReport),
    /// The store already holds labels for the address; nothing new to find.
    RemoteKnown,
    Committed(AddressReport),
    /// Every page failed; nothing was cached.
    Unreachable,
}

impl AddressOutcome {
    pub fn report(&self) -> Option<&AddressReport> {
        match self {
            AddressOutcome::CacheHit(report) | AddressOutcome::Committed(report) => Some(report),
            AddressOutcome::RemoteKnown | AddressOutcome::Unreachable => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Labels emitted by this batch, in no particular order.
    pub added: Vec<LabelPair>,
    /// Labels suppressed as already emitted.
    pub duplicates: Vec<LabelPair>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.duplicates.is_empty()
    }
}

impl From<Classified> for BatchOutcome {
    fn from(c: Classified) -> Self {
        Self {
            added: c.added,
            duplicates: c.duplicates,
        }
    }
}

#[derive(Clone)]
pub struct Evaluator {
    inner: Arc<EvaluatorInner>,
}

struct EvaluatorInner {
    extractor: Option<Arc<dyn Extractor>>,
    scanner: Scanner,
    cache: Arc<ReportCache>,
    store: Arc<dyn LabelStore>,
    filter: DuplicateFilter,
    sink: Arc<dyn EventSink>,
    max_workers: usize,
}

type Queue = Arc<Mutex<mpsc::Receiver<String>>>;
type Proposed = Arc<Mutex<Vec<LabelPair>>>;

impl Evaluator {
    pub fn new(deps: EvaluatorDeps, settings: EngineSettings) -> Self {
        Self::with_cache(deps, settings, Arc::new(ReportCache::new(settings.cache_ttl)))
    }

    /// Build an evaluator around an existing cache.
    pub fn with_cache(deps: EvaluatorDeps, settings: EngineSettings, cache: Arc<ReportCache>) -> Self {
        let filter = DuplicateFilter::new(
            deps.store.clone(),
            deps.label_api,
            &deps.bot_id,
            deps.sink.clone(),
        );
        Self {
            inner: Arc::new(EvaluatorInner {
                extractor: deps.extractor,
                scanner: Scanner::new(deps.fetcher),
                cache,
                store: deps.store,
                filter,
                sink: deps.sink,
                max_workers: settings.max_workers.max(1),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<ReportCache> {
        &self.inner.cache
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.inner.sink
    }

    /// Evaluate every address of a batch and return the labels to emit along
    /// with the suppressed duplicates. Surviving labels are recorded in the
    /// durable store before returning. A worker fault fails the whole batch.
    pub async fn evaluate_batch<I>(&self, addresses: I) -> Result<BatchOutcome>
    where
        I: IntoIterator<Item = String>,
    {
        let addresses: BTreeSet<String> = addresses.into_iter().collect();

        let Some(extractor) = self.inner.extractor.clone() else {
            self.inner.sink.record(EngineEvent::NoExtractor {
                addresses: addresses.len(),
            });
            return Ok(BatchOutcome::default());
        };

        let workers = worker_count(self.inner.max_workers, addresses.len());
        if workers == 0 {
            return Ok(BatchOutcome::default());
        }
        self.inner.sink.record(EngineEvent::BatchStarted {
            addresses: addresses.len(),
            workers,
        });

        let proposed = match self.run_pool(extractor, addresses, workers).await {
            Ok(proposed) => proposed,
            Err(e) => {
                self.inner.sink.record(EngineEvent::BatchFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let classified = self.inner.filter.classify(proposed).await;
        self.inner.filter.persist(&classified.added).await;

        self.inner.sink.record(EngineEvent::BatchFinished {
            added: classified.added.len(),
            duplicates: classified.duplicates.len(),
        });
        Ok(classified.into())
    }

    /// One producer feeds a bounded queue; `workers` consumers drain it.
    /// The first failed task aborts the rest.
    async fn run_pool(
        &self,
        extractor: Arc<dyn Extractor>,
        addresses: BTreeSet<String>,
        workers: usize,
    ) -> Result<Vec<LabelPair>> {
        let (tx, rx) = mpsc::channel::<String>(1);
        let queue: Queue = Arc::new(Mutex::new(rx));
        let proposed: Proposed = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let inner = self.inner.clone();
            let extractor = extractor.clone();
            let queue = queue.clone();
            let proposed = proposed.clone();
            tasks.spawn(async move { inner.run_worker(extractor, queue, proposed).await });
        }

        tasks.spawn(async move {
            for address in addresses {
                tx.send(address).await.map_err(|e| {
                    EngineError::Producer(format!("queue closed before {} was handed off", e.0))
                })?;
            }
            Ok(())
        });

        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| EngineError::Worker(e.to_string()))
                .and_then(|r| r);
            if let Err(e) = result {
                tasks.abort_all();
                return Err(e);
            }
        }

        let mut proposed = proposed.lock().await;
        Ok(std::mem::take(&mut *proposed))
    }
}

impl EvaluatorInner {
    async fn run_worker(
        &self,
        extractor: Arc<dyn Extractor>,
        queue: Queue,
        proposed: Proposed,
    ) -> Result<()> {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(address) = next else {
                return Ok(());
            };

            let outcome = self.evaluate_address(extractor.as_ref(), &address).await;
            let Some(report) = outcome.report() else {
                continue;
            };

            let labels = report.candidate_labels();
            if labels.is_empty() {
                continue;
            }
            let mut proposed = proposed.lock().await;
            proposed.extend(
                labels
                    .into_iter()
                    .map(|label| LabelPair::new(address.clone(), label)),
            );
        }
    }

    async fn evaluate_address(&self, extractor: &dyn Extractor, address: &str) -> AddressOutcome {
        if let Some(report) = self.cache.get(address).await {
            self.sink.record(EngineEvent::CacheHit {
                address: address.to_string(),
            });
            return AddressOutcome::CacheHit(report);
        }

        match self.store.entity_exists(address).await {
            Ok(true) => {
                self.sink.record(EngineEvent::RemoteKnown {
                    address: address.to_string(),
                });
                return AddressOutcome::RemoteKnown;
            }
            Ok(false) => {}
            Err(e) => self.sink.record(EngineEvent::StoreError {
                operation: "entity_exists",
                entity: address.to_string(),
                error: e.to_string(),
            }),
        }

        let scan = self.scanner.scan_pages(extractor, address).await;
        if scan.is_unreachable() {
            self.sink.record(EngineEvent::Unreachable {
                address: address.to_string(),
                pages_failed: scan.pages_failed,
            });
            return AddressOutcome::Unreachable;
        }

        self.sink.record(EngineEvent::Scanned {
            address: address.to_string(),
            tags: scan.report.tags.len(),
            has_name: !scan.report.name.is_empty(),
            pages_fetched: scan.pages_fetched,
            pages_failed: scan.pages_failed,
        });
        AddressOutcome::Committed(self.cache.commit(address, scan.report).await)
    }
}
