//! In-process address → report cache.
//!
//! One exclusive lock guards the map and every freshness comparison. Callers
//! only see `get` / `commit`, each a separate short critical section, so a
//! slow scan or snapshot exchange never runs while the lock is held.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use labelwatch_common::AddressReport;
use labelwatch_store::{Snapshot, SnapshotStore, StoreError};
use tokio::sync::Mutex;

pub const DEFAULT_TTL_HOURS: i64 = 72;

pub struct ReportCache {
    entries: Mutex<HashMap<String, AddressReport>>,
    ttl: Duration,
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_TTL_HOURS))
    }
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached report for `address` if it was refreshed within the TTL.
    pub async fn get(&self, address: &str) -> Option<AddressReport> {
        self.get_at(address, Utc::now()).await
    }

    pub async fn get_at(&self, address: &str, now: DateTime<Utc>) -> Option<AddressReport> {
        let entries = self.entries.lock().await;
        entries
            .get(address)
            .filter(|report| report.is_fresh(now, self.ttl))
            .cloned()
    }

    /// Insert a freshly scanned report, or merge it into the existing entry.
    /// Returns the report now held for `address`.
    pub async fn commit(&self, address: &str, report: AddressReport) -> AddressReport {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(address) {
            Some(existing) => {
                existing.merge(&report);
                existing.clone()
            }
            None => {
                entries.insert(address.to_string(), report.clone());
                report
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Two-way add-only merge with a remote snapshot, written back to the
    /// store. The lock is held only for the in-memory merge, never across the
    /// load or the save. Returns the number of entries in the merged snapshot.
    pub async fn reconcile(&self, store: &dyn SnapshotStore) -> Result<usize, StoreError> {
        let remote: Snapshot = store.load().await?;
        let merged = self.merge_snapshot(remote).await;
        store.save(&merged).await?;
        Ok(merged.len())
    }

    async fn merge_snapshot(&self, mut remote: Snapshot) -> Snapshot {
        let mut entries = self.entries.lock().await;
        for (address, report) in entries.iter() {
            remote
                .entry(address.clone())
                .and_modify(|saved| saved.merge(report))
                .or_insert_with(|| report.clone());
        }
        for (address, report) in &remote {
            entries
                .entry(address.clone())
                .and_modify(|local| local.merge(report))
                .or_insert_with(|| report.clone());
        }
        remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration as StdDuration, Instant};

    use async_trait::async_trait;
    use labelwatch_store::testing::MemorySnapshotStore;

    fn report(tags: &[&str], age_hours: i64) -> AddressReport {
        AddressReport::new(
            "",
            tags.iter().map(|t| t.to_string()).collect(),
            Utc::now() - Duration::hours(age_hours),
        )
    }

    #[tokio::test]
    async fn fresh_entry_is_returned() {
        let cache = ReportCache::default();
        cache.commit("0xa", report(&["heist"], 1)).await;
        let hit = cache.get("0xa").await.unwrap();
        assert_eq!(hit.tags, vec!["heist"]);
        assert!(cache.get("0xb").await.is_none());
    }

    #[tokio::test]
    async fn stale_entry_is_a_miss_but_kept() {
        let cache = ReportCache::default();
        cache.commit("0xa", report(&["heist"], 73)).await;
        assert!(cache.get("0xa").await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn commit_merges_into_existing() {
        let cache = ReportCache::default();
        cache.commit("0xa", report(&["heist"], 80)).await;
        let merged = cache.commit("0xa", report(&["exploit"], 0)).await;
        assert_eq!(merged.tags, vec!["heist", "exploit"]);
        assert!(cache.get("0xa").await.is_some());
    }

    #[tokio::test]
    async fn freshness_uses_given_clock() {
        let cache = ReportCache::default();
        let checked = Utc::now();
        cache
            .commit("0xa", AddressReport::new("", vec![], checked))
            .await;
        assert!(cache.get_at("0xa", checked + Duration::hours(71)).await.is_some());
        assert!(cache.get_at("0xa", checked + Duration::hours(72)).await.is_none());
    }

    #[tokio::test]
    async fn reconcile_merges_both_ways() {
        let mut remote = Snapshot::new();
        remote.insert("0xa".into(), report(&["exploit"], 2));
        remote.insert("0xr".into(), report(&["phish-hack"], 2));
        let store = MemorySnapshotStore::new(remote);

        let cache = ReportCache::default();
        cache.commit("0xa", report(&["heist"], 1)).await;
        cache.commit("0xl", report(&["blocked"], 1)).await;

        let entries = cache.reconcile(&store).await.unwrap();
        assert_eq!(entries, 3);

        let saved = store.current().await;
        assert_eq!(saved["0xa"].tags, vec!["exploit", "heist"]);
        assert!(saved.contains_key("0xl"));

        assert_eq!(cache.get("0xa").await.unwrap().tags, vec!["heist", "exploit"]);
        assert_eq!(cache.get("0xr").await.unwrap().tags, vec!["phish-hack"]);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn default_ttl_is_three_days() {
        assert_eq!(ReportCache::default().ttl(), Duration::hours(72));
    }

    /// Snapshot store on a slow network.
    struct SlowSnapshotStore {
        inner: MemorySnapshotStore,
        delay: StdDuration,
    }

    #[async_trait]
    impl SnapshotStore for SlowSnapshotStore {
        async fn load(&self) -> labelwatch_store::Result<Snapshot> {
            tokio::time::sleep(self.delay).await;
            self.inner.load().await
        }

        async fn save(&self, snapshot: &Snapshot) -> labelwatch_store::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.save(snapshot).await
        }
    }

    #[tokio::test]
    async fn reconcile_does_not_block_readers_during_io() {
        let cache = Arc::new(ReportCache::default());
        cache.commit("0xa", report(&["heist"], 1)).await;
        let store = Arc::new(SlowSnapshotStore {
            inner: MemorySnapshotStore::new(Snapshot::new()),
            delay: StdDuration::from_millis(800),
        });

        let sync = {
            let cache = cache.clone();
            let store = store.clone();
            tokio::spawn(async move { cache.reconcile(store.as_ref()).await })
        };

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let started = Instant::now();
        assert!(cache.get("0xa").await.is_some());
        assert!(started.elapsed() < StdDuration::from_millis(400));

        tokio::time::sleep(StdDuration::from_millis(800)).await;
        let started = Instant::now();
        cache.commit("0xb", report(&["exploit"], 0)).await;
        assert!(started.elapsed() < StdDuration::from_millis(400));

        assert_eq!(sync.await.unwrap().unwrap(), 1);
        assert!(store.inner.current().await.contains_key("0xa"));
    }
}
