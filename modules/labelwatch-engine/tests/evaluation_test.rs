//! End-to-end batch evaluation over in-memory collaborators.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use labelwatch_common::{AddressReport, LabelPair};
use labelwatch_engine::testing::Harness;
use labelwatch_engine::{EngineEvent, EngineSettings, Evaluator};
use labelwatch_scanner::testing::mock_page;
use labelwatch_scanner::Extractor;
use labelwatch_store::testing::MockLabelApi;
use labelwatch_store::LabelStore;

fn addrs(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

fn label_set(labels: &[LabelPair]) -> BTreeSet<(String, String)> {
    labels
        .iter()
        .map(|p| (p.entity.clone(), p.label.clone()))
        .collect()
}

fn set(list: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    list.iter()
        .map(|(e, l)| (e.to_string(), l.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Full flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_labels_are_emitted_once_then_suppressed() {
    let harness = Harness::new(1)
        .page(0, "0xa", &mock_page("", &["heist"]))
        .page(0, "0xb", &mock_page("", &["exploit", "heist"]));
    let evaluator = harness.evaluator();

    let first = evaluator.evaluate_batch(addrs(&["0xa", "0xb"])).await.unwrap();
    assert_eq!(
        label_set(&first.added),
        set(&[("0xa", "heist"), ("0xb", "exploit"), ("0xb", "heist")])
    );
    assert!(first.duplicates.is_empty());
    assert_eq!(harness.store().records().await.len(), 3);
    assert_eq!(harness.label_api().call_count(), 3);

    // within the TTL: cache hits, and the store answers every duplicate check
    let second = evaluator.evaluate_batch(addrs(&["0xa", "0xb"])).await.unwrap();
    assert!(second.added.is_empty());
    assert_eq!(label_set(&second.duplicates), label_set(&first.added));
    assert_eq!(harness.label_api().call_count(), 3);
    assert_eq!(harness.fetcher().call_count(), 2);
}

#[tokio::test]
async fn display_name_becomes_a_name_label() {
    let harness = Harness::new(1).page(0, "0xa", &mock_page("Fake_Phishing 12", &[]));
    let outcome = harness
        .evaluator()
        .evaluate_batch(addrs(&["0xa"]))
        .await
        .unwrap();

    assert_eq!(label_set(&outcome.added), set(&[("0xa", "name|fake_phishing 12")]));
}

#[tokio::test]
async fn repeated_addresses_are_scanned_once() {
    let harness = Harness::new(2)
        .page(0, "0xa", &mock_page("", &["heist"]))
        .page(1, "0xa", &mock_page("", &["heist"]));

    let outcome = harness
        .evaluator()
        .evaluate_batch(addrs(&["0xa", "0xa", "0xa"]))
        .await
        .unwrap();

    assert_eq!(outcome.added.len(), 1);
    assert_eq!(harness.fetcher().call_count(), 2);
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_entry_is_rescanned_and_merged() {
    let harness = Harness::new(1).page(0, "0xa", &mock_page("", &["exploit"]));
    let evaluator = harness.evaluator();
    evaluator
        .cache()
        .commit(
            "0xa",
            AddressReport::new("", vec!["heist".into()], Utc::now() - Duration::hours(80)),
        )
        .await;

    let outcome = evaluator.evaluate_batch(addrs(&["0xa"])).await.unwrap();

    assert_eq!(harness.fetcher().call_count(), 1);
    let cached = evaluator.cache().get("0xa").await.unwrap();
    assert_eq!(cached.tags, vec!["heist", "exploit"]);
    assert_eq!(
        label_set(&outcome.added),
        set(&[("0xa", "heist"), ("0xa", "exploit")])
    );
}

#[tokio::test]
async fn short_ttl_forces_rescan() {
    let harness = Harness::new(1)
        .page(0, "0xa", &mock_page("", &["heist"]))
        .with_settings(EngineSettings {
            cache_ttl: Duration::zero(),
            ..EngineSettings::default()
        });
    let evaluator = harness.evaluator();

    evaluator.evaluate_batch(addrs(&["0xa"])).await.unwrap();
    harness.store().set_failing(true);
    evaluator.evaluate_batch(addrs(&["0xa"])).await.unwrap();

    assert_eq!(harness.fetcher().call_count(), 2);
}

#[tokio::test]
async fn unreachable_address_is_not_cached() {
    let harness = Harness::new(2);
    let evaluator = harness.evaluator();

    let outcome = evaluator.evaluate_batch(addrs(&["0xa"])).await.unwrap();
    assert!(outcome.is_empty());
    assert!(evaluator.cache().is_empty().await);
    assert_eq!(
        harness
            .sink()
            .count(|e| matches!(e, EngineEvent::Unreachable { pages_failed: 2, .. })),
        1
    );

    harness.set_page(1, "0xa", &mock_page("", &["heist"]));
    let outcome = evaluator.evaluate_batch(addrs(&["0xa"])).await.unwrap();
    assert_eq!(label_set(&outcome.added), set(&[("0xa", "heist")]));
    assert!(evaluator.cache().get("0xa").await.is_some());
}

// ---------------------------------------------------------------------------
// Duplicate store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn known_entity_is_not_scanned() {
    let harness = Harness::new(1).page(0, "0xa", &mock_page("", &["heist"]));
    harness.store().put_label("0xa", "heist").await.unwrap();

    let outcome = harness
        .evaluator()
        .evaluate_batch(addrs(&["0xa"]))
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(harness.fetcher().call_count(), 0);
    assert_eq!(harness.label_api().call_count(), 0);
    assert_eq!(
        harness
            .sink()
            .count(|e| matches!(e, EngineEvent::RemoteKnown { .. })),
        1
    );
}

#[tokio::test]
async fn label_api_outage_fails_open() {
    let harness = Harness::new(1)
        .page(0, "0xa", &mock_page("", &["heist"]))
        .page(0, "0xb", &mock_page("", &["exploit"]))
        .with_label_api(MockLabelApi::new().failing_from(1));

    let outcome = harness
        .evaluator()
        .evaluate_batch(addrs(&["0xa", "0xb"]))
        .await
        .unwrap();

    assert_eq!(outcome.added.len(), 2);
    assert!(outcome.duplicates.is_empty());
    assert_eq!(harness.label_api().call_count(), 1);
    assert_eq!(harness.store().records().await.len(), 2);
}

#[tokio::test]
async fn label_api_hit_is_suppressed() {
    let harness = Harness::new(1)
        .page(0, "0xa", &mock_page("", &["heist", "exploit"]))
        .with_label_api(MockLabelApi::new().with_label("0xa", "heist"));

    let outcome = harness
        .evaluator()
        .evaluate_batch(addrs(&["0xa"]))
        .await
        .unwrap();

    assert_eq!(label_set(&outcome.added), set(&[("0xa", "exploit")]));
    assert_eq!(label_set(&outcome.duplicates), set(&[("0xa", "heist")]));
    // both end up in the store: one written back, one emitted
    assert_eq!(harness.store().records().await.len(), 2);
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workers_never_exceed_batch_size() {
    let harness = Harness::new(1);
    harness
        .evaluator()
        .evaluate_batch(addrs(&["0xa", "0xb", "0xc"]))
        .await
        .unwrap();

    assert_eq!(
        harness.sink().count(|e| matches!(
            e,
            EngineEvent::BatchStarted {
                addresses: 3,
                workers: 3
            }
        )),
        1
    );
}

#[tokio::test]
async fn large_batch_uses_the_worker_cap() {
    let harness = Harness::new(1);
    let addresses: Vec<String> = (0..25).map(|i| format!("0x{i:02x}")).collect();
    for address in &addresses {
        harness.set_page(0, address, &mock_page("", &["heist"]));
    }

    let outcome = harness
        .evaluator()
        .evaluate_batch(addresses.clone())
        .await
        .unwrap();

    assert_eq!(outcome.added.len(), 25);
    assert_eq!(harness.fetcher().call_count(), 25);
    assert_eq!(
        harness
            .sink()
            .count(|e| matches!(e, EngineEvent::BatchStarted { workers: 10, .. })),
        1
    );
}

#[tokio::test]
async fn empty_batch_does_nothing() {
    let harness = Harness::new(1);
    let outcome = harness.evaluator().evaluate_batch(Vec::new()).await.unwrap();
    assert!(outcome.is_empty());
    assert!(harness.sink().events().is_empty());
}

#[tokio::test]
async fn missing_extractor_is_a_no_op() {
    let harness = Harness::new(1).page(0, "0xa", &mock_page("", &["heist"]));
    let mut deps = harness.deps();
    deps.extractor = None;
    let evaluator = Evaluator::new(deps, EngineSettings::default());

    let outcome = evaluator.evaluate_batch(addrs(&["0xa"])).await.unwrap();

    assert!(outcome.is_empty());
    assert_eq!(harness.fetcher().call_count(), 0);
    assert_eq!(
        harness
            .sink()
            .count(|e| matches!(e, EngineEvent::NoExtractor { addresses: 1 })),
        1
    );
}

struct PanickingExtractor;

impl Extractor for PanickingExtractor {
    fn extract_name(&self, _body: &str) -> String {
        panic!("extractor blew up")
    }

    fn extract_tags(&self, _body: &str) -> Vec<String> {
        panic!("extractor blew up")
    }

    fn url_patterns(&self) -> Vec<String> {
        vec!["https://explorer.test/page0/{address}".to_string()]
    }
}

#[tokio::test]
async fn worker_fault_fails_the_batch() {
    let harness = Harness::new(1).page(0, "0xa", &mock_page("", &["heist"]));
    let mut deps = harness.deps();
    deps.extractor = Some(Arc::new(PanickingExtractor));
    let evaluator = Evaluator::new(deps, EngineSettings::default());

    let result = evaluator.evaluate_batch(addrs(&["0xa"])).await;

    assert!(result.is_err());
    assert!(harness.store().records().await.is_empty());
    assert_eq!(
        harness
            .sink()
            .count(|e| matches!(e, EngineEvent::BatchFailed { .. })),
        1
    );
}
