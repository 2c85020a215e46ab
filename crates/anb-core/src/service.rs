//! Fetch cycle composition: fetch → diff → (caller renders) → commit.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    announcement::AnnouncementRecord,
    fetcher::AnnouncementSource,
    watermark::{Diff, WatermarkTracker},
    Error, Result,
};

/// Entry point for both the chat commands and the periodic watcher.
///
/// Cycles are serialized on a single gate so a command and a timer tick can
/// never interleave their diff and commit.
pub struct AnnouncementService {
    source: Arc<dyn AnnouncementSource>,
    tracker: WatermarkTracker,
    gate: Arc<Mutex<()>>,
}

/// An in-flight fetch cycle. Holds the gate until committed or dropped.
pub struct FetchCycle {
    diff: Diff,
    tracker: WatermarkTracker,
    _gate: OwnedMutexGuard<()>,
}

impl FetchCycle {
    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    pub fn is_empty(&self) -> bool {
        self.diff.all_items.is_empty()
    }

    /// Persist the newest fetched entry as the watermark.
    ///
    /// Failure is logged and returned; the next cycle may then re-announce the
    /// same entries, which is preferred over losing them.
    pub fn commit(self) -> Result<()> {
        let res = self.tracker.commit(&self.diff.all_items);
        if let Err(e) = &res {
            tracing::warn!("watermark commit failed: {e}");
        }
        res
    }
}

impl AnnouncementService {
    pub fn new(source: Arc<dyn AnnouncementSource>, tracker: WatermarkTracker) -> Self {
        Self {
            source,
            tracker,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn tracker(&self) -> &WatermarkTracker {
        &self.tracker
    }

    pub async fn begin_cycle(&self) -> FetchCycle {
        let gate = self.gate.clone().lock_owned().await;
        let fresh = self.source.fetch().await;
        let diff = self.tracker.diff(&fresh);
        tracing::info!(
            status = ?diff.status,
            fetched = diff.all_items.len(),
            new = diff.new_items.len(),
            "fetch cycle"
        );
        FetchCycle {
            diff,
            tracker: self.tracker.clone(),
            _gate: gate,
        }
    }

    /// Fetch and filter by title; never touches the watermark.
    pub async fn search(&self, keyword: &str) -> Result<Vec<AnnouncementRecord>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::NotFound("empty keyword".to_string()));
        }
        let items = self.source.fetch().await;
        let matches = search_titles(&items, keyword);
        if matches.is_empty() {
            return Err(Error::NotFound(format!("no announcement matches `{keyword}`")));
        }
        Ok(matches)
    }
}

/// Case-sensitive substring match on titles, page order kept.
pub fn search_titles(items: &[AnnouncementRecord], keyword: &str) -> Vec<AnnouncementRecord> {
    items
        .iter()
        .filter(|a| a.title.contains(keyword))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::watermark::{DiffStatus, MemoryStore, WatermarkStore};

    struct FixedSource {
        items: std::sync::Mutex<Vec<AnnouncementRecord>>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FixedSource {
        fn new(items: Vec<AnnouncementRecord>) -> Self {
            Self {
                items: std::sync::Mutex::new(items),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn set(&self, items: Vec<AnnouncementRecord>) {
            *self.items.lock().unwrap() = items;
        }
    }

    #[async_trait]
    impl AnnouncementSource for FixedSource {
        async fn try_fetch(&self) -> Result<Vec<AnnouncementRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Network("connection refused".to_string()));
            }
            Ok(self.items.lock().unwrap().clone())
        }
    }

    struct ReadOnlyStore;

    impl WatermarkStore for ReadOnlyStore {
        fn read(&self) -> Result<Option<AnnouncementRecord>> {
            Ok(None)
        }

        fn write(&self, _record: &AnnouncementRecord) -> Result<()> {
            Err(Error::persistence("/ro/w.json", "read-only file system"))
        }
    }

    fn rec(date: &str, title: &str) -> AnnouncementRecord {
        AnnouncementRecord::new(date, title, "#")
    }

    fn service(source: Arc<FixedSource>) -> AnnouncementService {
        AnnouncementService::new(
            source,
            WatermarkTracker::new(Arc::new(MemoryStore::default())),
        )
    }

    #[tokio::test]
    async fn first_cycle_sets_baseline_then_reports_new_items() {
        let source = Arc::new(FixedSource::new(vec![rec("2024-01-10", "A")]));
        let svc = service(source.clone());

        let cycle = svc.begin_cycle().await;
        assert_eq!(cycle.diff().status, DiffStatus::FirstRun);
        cycle.commit().unwrap();

        source.set(vec![rec("2024-01-11", "B"), rec("2024-01-10", "A")]);
        let cycle = svc.begin_cycle().await;
        assert_eq!(cycle.diff().new_items, vec![rec("2024-01-11", "B")]);
        cycle.commit().unwrap();

        let cycle = svc.begin_cycle().await;
        assert_eq!(cycle.diff().status, DiffStatus::UpToDate);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_the_watermark() {
        let svc = AnnouncementService::new(
            Arc::new(FixedSource::failing()),
            WatermarkTracker::new(Arc::new(MemoryStore::with(rec("2024-01-10", "A")))),
        );

        let cycle = svc.begin_cycle().await;
        assert!(cycle.is_empty());
        assert_eq!(cycle.diff().status, DiffStatus::Empty);
        cycle.commit().unwrap();

        assert_eq!(svc.tracker().load(), Some(rec("2024-01-10", "A")));
    }

    #[tokio::test]
    async fn commit_failure_is_reported_but_diff_stays_usable() {
        let svc = AnnouncementService::new(
            Arc::new(FixedSource::new(vec![rec("2024-01-10", "A")])),
            WatermarkTracker::new(Arc::new(ReadOnlyStore)),
        );
        let cycle = svc.begin_cycle().await;
        let rendered = cycle.diff().all_items.len();
        assert!(matches!(cycle.commit(), Err(Error::Persistence { .. })));
        assert_eq!(rendered, 1);
    }

    #[tokio::test]
    async fn cycles_are_serialized() {
        let svc = Arc::new(service(Arc::new(FixedSource::new(vec![rec("d", "t")]))));
        let held = svc.begin_cycle().await;

        let svc2 = svc.clone();
        let waiter = tokio::spawn(async move { svc2.begin_cycle().await.diff().status });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        held.commit().unwrap();
        let status = waiter.await.unwrap();
        assert_eq!(status, DiffStatus::UpToDate);
    }

    #[tokio::test]
    async fn search_filters_titles_without_committing() {
        let source = Arc::new(FixedSource::new(vec![
            rec("2024-01-12", "國科會計畫徵求"),
            rec("2024-01-11", "停電通知"),
            rec("2024-01-10", "國科會補助說明"),
        ]));
        let svc = service(source.clone());

        let found = svc.search("國科").await.unwrap();
        assert_eq!(
            found.iter().map(|a| a.date.as_str()).collect::<Vec<_>>(),
            vec!["2024-01-12", "2024-01-10"]
        );
        assert_eq!(svc.tracker().load(), None);

        assert!(matches!(svc.search("獎學金").await, Err(Error::NotFound(_))));
        assert!(matches!(svc.search("  ").await, Err(Error::NotFound(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
