use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use postcheck_common::MessageRecord;
use tokio::{sync::Notify, time::Instant};

use crate::{
    StoreError,
    r#trait::{MIN_INTERVAL, RecordFilter, RecordStore, first_unseen_match, remaining_until},
    types::{RecordCategory, RecordId, StoredRecord},
};

/// In-memory record store
///
/// Records live in a `DashMap` keyed by category, each category an
/// append-only `Vec`. Pollers are woken on every append, so a waiting poll
/// sees a new record without sitting out the rest of its interval.
///
/// # Capacity Management
/// An optional capacity bounds the total number of records across all
/// categories. Appends beyond it fail with [`StoreError::CapacityExceeded`].
/// A slot is reserved on the shared counter before the record is pushed, so
/// concurrent appends never overshoot the limit.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<RecordCategory, Vec<StoredRecord>>>,
    len: Arc<AtomicUsize>,
    notify: Arc<Notify>,
    capacity: Option<usize>,
}

impl MemoryRecordStore {
    /// Create a new empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store holding at most `capacity` records
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Total number of records across all categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Wait until `category` holds at least `expected` records
    ///
    /// # Errors
    /// Returns an error if the timeout is reached before the expected count
    pub async fn wait_for_count(
        &self,
        category: RecordCategory,
        expected: usize,
        timeout: Duration,
    ) -> crate::Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let count = self.records.get(&category).map_or(0, |records| records.len());
                if count >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .map_err(|e| StoreError::Internal(format!("Timeout waiting for {category} records: {e}")))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append(
        &self,
        category: RecordCategory,
        record: MessageRecord,
    ) -> crate::Result<RecordId> {
        match self.capacity {
            Some(capacity) => {
                self.len
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |len| {
                        (len < capacity).then_some(len + 1)
                    })
                    .map_err(|len| StoreError::CapacityExceeded { len, capacity })?;
            }
            None => {
                self.len.fetch_add(1, Ordering::SeqCst);
            }
        }

        let id = RecordId::generate();
        self.records.entry(category).or_default().push(StoredRecord {
            id,
            category,
            record,
        });

        tracing::trace!(%id, %category, "Record appended");
        self.notify.notify_waiters();

        Ok(id)
    }

    async fn list(&self, category: RecordCategory) -> crate::Result<Vec<StoredRecord>> {
        Ok(self
            .records
            .get(&category)
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }

    async fn clear(&self) -> crate::Result<()> {
        // Release only what is removed; a concurrent append keeps its slot
        self.records.retain(|_, records| {
            self.len.fetch_sub(records.len(), Ordering::SeqCst);
            false
        });
        Ok(())
    }

    async fn poll(
        &self,
        category: RecordCategory,
        max_wait: Duration,
        interval: Duration,
        accept: &RecordFilter<'_>,
    ) -> crate::Result<Option<MessageRecord>> {
        let deadline = Instant::now().checked_add(max_wait);
        let interval = interval.max(MIN_INTERVAL);
        let mut seen = HashSet::new();

        loop {
            // Register for wakeups before looking, so an append between the
            // query and the wait is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let records = self.list(category).await?;
            if let Some(found) = first_unseen_match(records, &mut seen, accept) {
                return Ok(Some(found));
            }

            let remaining = remaining_until(deadline);
            if remaining.is_zero() {
                tracing::trace!(%category, ?max_wait, "Poll deadline reached");
                return Ok(None);
            }

            let _ = tokio::time::timeout(interval.min(remaining), notified).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str) -> MessageRecord {
        MessageRecord::builder()
            .subject(subject)
            .from("a@x")
            .to("b@x")
            .body("hi")
            .build()
    }

    fn with_subject(subject: &'static str) -> impl Fn(&MessageRecord) -> bool + Send + Sync {
        move |record| record.subject() == Some(subject)
    }

    #[tokio::test]
    async fn test_append_and_list_keep_order() {
        let store = MemoryRecordStore::new();

        let first = store
            .append(RecordCategory::Delivered, record("one"))
            .await
            .expect("append");
        let second = store
            .append(RecordCategory::Delivered, record("two"))
            .await
            .expect("append");
        store
            .append(RecordCategory::Bounced, record("bounced"))
            .await
            .expect("append");

        let delivered = store.list(RecordCategory::Delivered).await.expect("list");
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].id, first);
        assert_eq!(delivered[1].id, second);
        assert_eq!(delivered[1].record.subject(), Some("two"));
        assert_eq!(store.len(), 3);

        store.clear().await.expect("clear");
        assert!(store.is_empty());
        assert!(store.list(RecordCategory::Bounced).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let store = MemoryRecordStore::with_capacity(2);
        assert_eq!(store.capacity(), Some(2));

        store
            .append(RecordCategory::Delivered, record("one"))
            .await
            .expect("first append");
        store
            .append(RecordCategory::Bounced, record("two"))
            .await
            .expect("second append");

        let err = store
            .append(RecordCategory::Delivered, record("three"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { len: 2, capacity: 2 }));

        store.clear().await.expect("clear");
        assert!(store.append(RecordCategory::Delivered, record("three")).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_holds_under_concurrent_appends() {
        let store = MemoryRecordStore::with_capacity(10);

        let writers: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append(RecordCategory::Delivered, record("racing"))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut accepted = 0;
        for writer in writers {
            if writer.await.expect("writer task") {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 10);
        assert_eq!(store.len(), 10);
        assert_eq!(store.list(RecordCategory::Delivered).await.expect("list").len(), 10);

        store.clear().await.expect("clear");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_poll_finds_existing_record() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Delivered, record("wanted"))
            .await
            .expect("append");

        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_secs(1),
                Duration::from_millis(10),
                &with_subject("wanted"),
            )
            .await
            .expect("poll");
        assert_eq!(found.and_then(|r| r.subject().map(str::to_owned)), Some("wanted".into()));
    }

    #[tokio::test]
    async fn test_poll_ignores_other_categories() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Bounced, record("wanted"))
            .await
            .expect("append");

        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_millis(50),
                Duration::from_millis(10),
                &with_subject("wanted"),
            )
            .await
            .expect("poll");
        assert!(found.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_poll_wakes_on_append() {
        let store = MemoryRecordStore::new();
        let writer = store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer
                .append(RecordCategory::Delivered, record("late"))
                .await
                .expect("append");
        });

        let started = std::time::Instant::now();
        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_secs(5),
                // Longer than the test should take, only a wakeup gets us out early
                Duration::from_secs(3),
                &with_subject("late"),
            )
            .await
            .expect("poll");

        assert!(found.is_some());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let store = MemoryRecordStore::new();
        let started = Instant::now();

        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_secs(1),
                Duration::from_millis(100),
                &with_subject("never"),
            )
            .await
            .expect("poll");

        assert!(found.is_none());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_poll_with_unbounded_wait_returns_match() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Delivered, record("wanted"))
            .await
            .expect("append");

        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_secs(u64::MAX),
                Duration::from_millis(10),
                &with_subject("wanted"),
            )
            .await
            .expect("poll");
        assert!(found.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_sees_refill_after_clear() {
        let store = MemoryRecordStore::new();
        for subject in ["a", "b", "c"] {
            store
                .append(RecordCategory::Delivered, record(subject))
                .await
                .expect("append");
        }

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Refill to the same length without yielding in between
            writer.clear().await.expect("clear");
            for subject in ["wanted", "d", "e"] {
                writer
                    .append(RecordCategory::Delivered, record(subject))
                    .await
                    .expect("append");
            }
        });

        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_millis(500),
                Duration::from_millis(200),
                &with_subject("wanted"),
            )
            .await
            .expect("poll");
        assert_eq!(found.and_then(|r| r.subject().map(str::to_owned)), Some("wanted".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_with_zero_interval_still_reaches_deadline() {
        let store = MemoryRecordStore::new();
        let started = Instant::now();

        let found = store
            .poll(
                RecordCategory::Delivered,
                Duration::from_millis(50),
                Duration::ZERO,
                &with_subject("never"),
            )
            .await
            .expect("poll");

        assert!(found.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_for_count() {
        let store = MemoryRecordStore::new();
        let writer = store.clone();

        tokio::spawn(async move {
            for subject in ["one", "two"] {
                writer
                    .append(RecordCategory::Bounced, record(subject))
                    .await
                    .expect("append");
            }
        });

        store
            .wait_for_count(RecordCategory::Bounced, 2, Duration::from_secs(1))
            .await
            .expect("both records arrive");

        let err = store
            .wait_for_count(RecordCategory::Delivered, 1, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timeout waiting for delivered records"));
    }
}
