// Test doubles and a harness for driving the evaluator without network
// or database.
//
// - RecordingSink (EventSink): keeps every event in memory
// - memory_store(): MemoryLabelStore keyed for chain 1, bot "bot"
// - Harness: MockExtractor + MockFetcher + MemoryLabelStore + MockLabelApi

use std::sync::{Arc, Mutex};

use labelwatch_scanner::testing::{MockExtractor, MockFetcher};
use labelwatch_scanner::Extractor;
use labelwatch_store::testing::MockLabelApi;
use labelwatch_store::{LabelKeys, MemoryLabelStore};

use crate::engine::{EngineSettings, Evaluator, EvaluatorDeps};
use crate::events::{EngineEvent, EventSink};

pub const TEST_BOT_ID: &str = "bot";

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub fn memory_store() -> Arc<MemoryLabelStore> {
    let keys = LabelKeys::new(1, TEST_BOT_ID).expect("static test keys are valid");
    Arc::new(MemoryLabelStore::new(keys))
}

/// Wires an evaluator over in-memory collaborators. Each call to
/// [`Harness::evaluator`] builds a new evaluator with an empty cache; the
/// collaborators are shared between them.
pub struct Harness {
    extractor: Arc<MockExtractor>,
    fetcher: Arc<MockFetcher>,
    store: Arc<MemoryLabelStore>,
    label_api: Arc<MockLabelApi>,
    sink: Arc<RecordingSink>,
    settings: EngineSettings,
}

impl Harness {
    /// `pages` explorer pages per address.
    pub fn new(pages: usize) -> Self {
        Self {
            extractor: Arc::new(MockExtractor::with_pages(pages)),
            fetcher: Arc::new(MockFetcher::new()),
            store: memory_store(),
            label_api: Arc::new(MockLabelApi::new()),
            sink: Arc::new(RecordingSink::default()),
            settings: EngineSettings::default(),
        }
    }

    /// Serve `body` as page `index` of `address`.
    pub fn page(self, index: usize, address: &str, body: &str) -> Self {
        self.set_page(index, address, body);
        self
    }

    pub fn set_page(&self, index: usize, address: &str, body: &str) {
        self.fetcher.set_page(&self.extractor.url(index, address), body);
    }

    pub fn with_label_api(mut self, api: MockLabelApi) -> Self {
        self.label_api = Arc::new(api);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.deps(), self.settings)
    }

    pub fn deps(&self) -> EvaluatorDeps {
        EvaluatorDeps {
            extractor: Some(self.extractor.clone() as Arc<dyn Extractor>),
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            label_api: self.label_api.clone(),
            sink: self.sink.clone(),
            bot_id: TEST_BOT_ID.to_string(),
        }
    }

    pub fn extractor(&self) -> &Arc<MockExtractor> {
        &self.extractor
    }

    pub fn fetcher(&self) -> &Arc<MockFetcher> {
        &self.fetcher
    }

    pub fn store(&self) -> &Arc<MemoryLabelStore> {
        &self.store
    }

    pub fn label_api(&self) -> &Arc<MockLabelApi> {
        &self.label_api
    }

    pub fn sink(&self) -> &Arc<RecordingSink> {
        &self.sink
    }
}
