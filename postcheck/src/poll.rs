//! Poll-until-match engine.
//!
//! Bridges an action whose effect shows up later in a record store and the
//! assertion about that effect. A [`PollRequest`] is built per attempt,
//! [run](PollRequest::run) once, and either yields the first accepted record
//! or fails with [`PollError::Timeout`]. Running consumes the request; a
//! retry needs a fresh one.

use std::{sync::Arc, time::Duration};

use postcheck_common::{MessageRecord, PollTimeouts, incoming, internal};
use postcheck_store::{RecordCategory, RecordStore, StoreError};
use thiserror::Error;

use crate::matcher::{self, MatchFn};

/// Default maximum time to wait for a matching record.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(45);

/// Default time between store queries.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum PollError {
    /// Nothing accepted before the deadline.
    #[error("No matching record found after {} seconds. Expected: {expected}", .waited.as_secs_f64())]
    Timeout {
        expected: Box<MessageRecord>,
        waited: Duration,
    },

    /// The record store could not be queried.
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

impl PollError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// One attempt at observing an expected record.
#[must_use]
pub struct PollRequest {
    expected: MessageRecord,
    accept: Arc<MatchFn>,
    category: RecordCategory,
    max_wait: Duration,
    interval: Duration,
}

impl PollRequest {
    /// Wait for a delivered record accepted by [`matcher::matches`], using
    /// the default timings.
    pub fn new(expected: MessageRecord) -> Self {
        Self {
            expected,
            accept: Arc::new(matcher::matches),
            category: RecordCategory::Delivered,
            max_wait: DEFAULT_MAX_WAIT,
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Look in `category` instead of delivered records.
    pub fn category(mut self, category: RecordCategory) -> Self {
        self.category = category;
        self
    }

    /// Give up after `max_wait`.
    pub fn within(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Query the store every `interval`.
    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeouts(self, timeouts: &PollTimeouts) -> Self {
        self.within(timeouts.max_wait()).every(timeouts.interval())
    }

    /// Replace the default matcher with a custom predicate over
    /// `(expected, candidate)`.
    pub fn accept_with<F>(mut self, accept: F) -> Self
    where
        F: Fn(&MessageRecord, &MessageRecord) -> bool + Send + Sync + 'static,
    {
        self.accept = Arc::new(accept);
        self
    }

    pub const fn expected(&self) -> &MessageRecord {
        &self.expected
    }

    /// Poll `store` until a record is accepted or the deadline passes.
    ///
    /// # Errors
    ///
    /// [`PollError::Timeout`] when nothing is accepted within the maximum
    /// wait, [`PollError::Store`] when the store cannot be queried.
    #[tracing::instrument(
        target = "postcheck::incoming",
        level = "debug",
        skip_all,
        fields(category = %self.category, max_wait = ?self.max_wait)
    )]
    pub async fn run(self, store: &dyn RecordStore) -> Result<MessageRecord, PollError> {
        let Self {
            expected,
            accept,
            category,
            max_wait,
            interval,
        } = self;

        internal!(
            level = INFO,
            "Polling for matching {} mail. Expecting: {}",
            category,
            expected
        );

        let started = tokio::time::Instant::now();
        let filter = |candidate: &MessageRecord| {
            incoming!(level = DEBUG, "Testing for match: {}", candidate);
            accept(&expected, candidate)
        };

        match store.poll(category, max_wait, interval, &filter).await? {
            Some(found) => {
                internal!(level = DEBUG, "Matched after {:.2?}: {}", started.elapsed(), found);
                Ok(found)
            }
            None => Err(PollError::Timeout {
                expected: Box::new(expected),
                waited: max_wait,
            }),
        }
    }
}

impl std::fmt::Debug for PollRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollRequest")
            .field("expected", &self.expected)
            .field("category", &self.category)
            .field("max_wait", &self.max_wait)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Wait up to `timeout` for a delivered record matching `expected`.
///
/// # Errors
///
/// See [`PollRequest::run`].
pub async fn poll_for_match(
    store: &dyn RecordStore,
    expected: MessageRecord,
    timeout: Duration,
) -> Result<MessageRecord, PollError> {
    PollRequest::new(expected).within(timeout).run(store).await
}

#[cfg(test)]
mod tests {
    use postcheck_store::MemoryRecordStore;
    use tokio::time::Instant;

    use super::*;

    fn with_body(body: &str) -> MessageRecord {
        MessageRecord::builder()
            .subject("S")
            .from("a@x")
            .to("b@x")
            .reply_to("a@x")
            .body(body)
            .build()
    }

    fn expected() -> MessageRecord {
        MessageRecord::builder()
            .subject("S")
            .from("a@x")
            .to("b@x")
            .body("hi")
            .build()
    }

    #[tokio::test]
    async fn test_accepts_first_matching_candidate() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Delivered, with_body("bye"))
            .await
            .expect("append");
        store
            .append(RecordCategory::Delivered, with_body("hi"))
            .await
            .expect("append");

        let found = poll_for_match(&store, expected(), Duration::from_secs(1))
            .await
            .expect("second candidate matches");
        assert_eq!(found.body(), Some("hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_wait() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Delivered, with_body("bye"))
            .await
            .expect("append");

        let started = Instant::now();
        let err = poll_for_match(&store, expected(), Duration::from_secs(1))
            .await
            .unwrap_err();
        let waited = started.elapsed();

        assert!(err.is_timeout());
        assert!(waited >= Duration::from_secs(1), "returned after {waited:?}");
        assert!(waited < Duration::from_secs(2), "returned after {waited:?}");

        let message = err.to_string();
        assert!(message.contains("after 1 seconds"), "{message}");
        assert!(message.contains("subject='S'"), "{message}");
        assert!(message.contains("body='hi'"), "{message}");
    }

    #[tokio::test]
    async fn test_custom_predicate_replaces_matcher() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Delivered, with_body("bye"))
            .await
            .expect("append");

        let found = PollRequest::new(expected())
            .within(Duration::from_secs(1))
            .accept_with(|expected, candidate| expected.subject() == candidate.subject())
            .run(&store)
            .await
            .expect("subject alone matches");
        assert_eq!(found.body(), Some("bye"));
    }

    #[tokio::test]
    async fn test_category_is_respected() {
        let store = MemoryRecordStore::new();
        store
            .append(RecordCategory::Delivered, with_body("hi"))
            .await
            .expect("append");

        let err = PollRequest::new(expected())
            .category(RecordCategory::Bounced)
            .within(Duration::from_millis(50))
            .every(Duration::from_millis(10))
            .run(&store)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_record_arriving_later_is_found() {
        let store = MemoryRecordStore::new();
        let writer = store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            writer
                .append(RecordCategory::Delivered, with_body("bye"))
                .await
                .expect("append");
            tokio::time::sleep(Duration::from_millis(30)).await;
            writer
                .append(RecordCategory::Delivered, with_body("hi"))
                .await
                .expect("append");
        });

        let found = PollRequest::new(expected())
            .timeouts(&PollTimeouts {
                max_wait_secs: 5,
                interval_ms: 10,
            })
            .run(&store)
            .await
            .expect("late record matches");
        assert_eq!(found.body(), Some("hi"));
    }

    #[test]
    fn test_defaults() {
        let request = PollRequest::new(expected());
        assert_eq!(request.max_wait, DEFAULT_MAX_WAIT);
        assert_eq!(request.interval, DEFAULT_INTERVAL);
        assert_eq!(request.category, RecordCategory::Delivered);
        assert_eq!(request.expected().subject(), Some("S"));
    }
}
