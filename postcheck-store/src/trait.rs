use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use postcheck_common::MessageRecord;
use tokio::time::Instant;

use crate::types::{RecordCategory, RecordId, StoredRecord};

/// Shortest pause between store queries.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Predicate applied to each observed record.
pub type RecordFilter<'a> = dyn Fn(&MessageRecord) -> bool + Send + Sync + 'a;

/// Store in which the mail service leaves evidence of what it delivered.
///
/// Writers append; pollers only read. Records within a category are
/// returned in the order they were appended.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Append a record to `category`.
    ///
    /// # Errors
    /// If the backend refuses the write
    async fn append(
        &self,
        category: RecordCategory,
        record: MessageRecord,
    ) -> crate::Result<RecordId>;

    /// All records currently in `category`, oldest first.
    ///
    /// # Errors
    /// If the backend cannot be read
    async fn list(&self, category: RecordCategory) -> crate::Result<Vec<StoredRecord>>;

    /// Remove every record from every category.
    ///
    /// # Errors
    /// If the backend cannot be cleared
    async fn clear(&self) -> crate::Result<()>;

    /// Wait for the first record in `category` accepted by `accept`.
    ///
    /// Re-queries the store every `interval` and returns `None` once
    /// `max_wait` has elapsed without a match. Each record is offered to
    /// `accept` at most once per call. A `max_wait` too large to express as
    /// a deadline waits indefinitely. An `interval` shorter than
    /// [`MIN_INTERVAL`] is raised to it.
    ///
    /// # Errors
    /// If a query against the store fails
    async fn poll(
        &self,
        category: RecordCategory,
        max_wait: Duration,
        interval: Duration,
        accept: &RecordFilter<'_>,
    ) -> crate::Result<Option<MessageRecord>> {
        let deadline = Instant::now().checked_add(max_wait);
        let mut seen = HashSet::new();

        loop {
            let records = self.list(category).await?;
            if let Some(found) = first_unseen_match(records, &mut seen, accept) {
                return Ok(Some(found));
            }

            let remaining = remaining_until(deadline);
            if remaining.is_zero() {
                return Ok(None);
            }

            tokio::time::sleep(interval.max(MIN_INTERVAL).min(remaining)).await;
        }
    }
}

/// Offer the records whose ids are not in `seen` to `accept`, remembering
/// each one offered.
///
/// Tracking ids rather than a position keeps records appended after a
/// `clear` visible even when the category refills to its earlier length.
pub(crate) fn first_unseen_match(
    records: Vec<StoredRecord>,
    seen: &mut HashSet<RecordId>,
    accept: &RecordFilter<'_>,
) -> Option<MessageRecord> {
    records
        .into_iter()
        .filter(|stored| seen.insert(stored.id))
        .map(|stored| stored.record)
        .find(|record| accept(record))
}

/// Time left before `deadline`, where `None` never expires.
pub(crate) fn remaining_until(deadline: Option<Instant>) -> Duration {
    deadline.map_or(Duration::MAX, |deadline| {
        deadline.saturating_duration_since(Instant::now())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(subject: &str) -> StoredRecord {
        StoredRecord {
            id: RecordId::generate(),
            category: RecordCategory::Delivered,
            record: MessageRecord::builder()
                .subject(subject)
                .from("a@x")
                .to("b@x")
                .body("hi")
                .build(),
        }
    }

    #[test]
    fn test_refill_after_clear_is_offered() {
        let accept = |record: &MessageRecord| record.subject() == Some("wanted");
        let mut seen = HashSet::new();

        let before = vec![stored("a"), stored("b"), stored("c")];
        assert!(first_unseen_match(before, &mut seen, &accept).is_none());

        // Same length as before the clear, none of the same records
        let after = vec![stored("wanted"), stored("d"), stored("e")];
        let found = first_unseen_match(after, &mut seen, &accept);
        assert_eq!(found.and_then(|r| r.subject().map(str::to_owned)), Some("wanted".into()));
    }

    #[test]
    fn test_records_offered_once() {
        let offered = std::sync::atomic::AtomicUsize::new(0);
        let accept = |_: &MessageRecord| {
            offered.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            false
        };
        let mut seen = HashSet::new();

        let first = stored("one");
        assert!(first_unseen_match(vec![first.clone()], &mut seen, &accept).is_none());
        assert!(first_unseen_match(vec![first, stored("two")], &mut seen, &accept).is_none());
        assert_eq!(offered.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_deadline_never_expires() {
        assert!(Instant::now().checked_add(Duration::from_secs(u64::MAX)).is_none());
        assert_eq!(remaining_until(None), Duration::MAX);

        let soon = Instant::now() + Duration::from_millis(5);
        assert_eq!(remaining_until(Some(soon)), Duration::from_millis(5));
    }
}
