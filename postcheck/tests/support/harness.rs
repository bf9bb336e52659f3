//! In-process harness for running scenarios
//!
//! # Example
//!
//! ```no_run
//! use support::TestHarness;
//!
//! #[tokio::test]
//! async fn test_basic() {
//!     let harness = TestHarness::builder().with_admin("admin@example.com").build();
//!     let report = harness.run(&[Scenario::BasicMessage]).await;
//!     assert!(report.is_success(), "{report}");
//! }
//! ```

use std::{sync::Arc, time::Duration};

use postcheck::{
    Scenario, ScenarioContext, SuiteReport,
    service::{LoopbackConfig, LoopbackMailService, MailService},
    run_suite,
};
use postcheck_common::{Environment, Platform, PollTimeouts};
use postcheck_store::{MemoryRecordStore, RecordCategory};

pub const APP_ID: &str = "theappid";

pub struct TestHarness {
    store: MemoryRecordStore,
    ctx: ScenarioContext,
}

impl TestHarness {
    #[must_use]
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub const fn ctx(&self) -> &ScenarioContext {
        &self.ctx
    }

    #[allow(dead_code)] // Not every test binary inspects the store
    pub const fn store(&self) -> &MemoryRecordStore {
        &self.store
    }

    pub async fn run(&self, scenarios: &[Scenario]) -> SuiteReport {
        run_suite(&self.ctx, scenarios).await
    }

    /// Wait until `expected` records exist in `category`.
    ///
    /// # Panics
    ///
    /// If they do not show up within a second.
    #[allow(dead_code)]
    pub async fn wait_for(&self, category: RecordCategory, expected: usize) {
        self.store
            .wait_for_count(category, expected, Duration::from_secs(1))
            .await
            .expect("records did not arrive");
    }
}

pub struct TestHarnessBuilder {
    platform: Platform,
    delivery_delay_ms: u64,
    timeouts: PollTimeouts,
    service: Option<Arc<dyn MailService>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            platform: Platform {
                app_id: APP_ID.to_string(),
                ..Platform::default()
            },
            delivery_delay_ms: 10,
            timeouts: PollTimeouts {
                max_wait_secs: 2,
                interval_ms: 10,
            },
            service: None,
        }
    }

    #[must_use]
    #[allow(dead_code)]
    pub fn with_admin(mut self, admin: &str) -> Self {
        self.platform.admin_email = Some(admin.to_string());
        self
    }

    #[must_use]
    #[allow(dead_code)]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.platform.environment = environment;
        self
    }

    #[must_use]
    #[allow(dead_code)]
    pub fn with_max_wait(mut self, secs: u64) -> Self {
        self.timeouts.max_wait_secs = secs;
        self
    }

    /// Drive scenarios through `service` instead of the loopback service.
    #[must_use]
    #[allow(dead_code)]
    pub fn with_service(mut self, service: Arc<dyn MailService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn build(self) -> TestHarness {
        let store = MemoryRecordStore::new();
        let service = self.service.unwrap_or_else(|| {
            Arc::new(LoopbackMailService::new(
                Arc::new(store.clone()),
                self.platform.clone(),
                &LoopbackConfig {
                    delivery_delay_ms: self.delivery_delay_ms,
                },
            ))
        });

        let ctx = ScenarioContext::new(self.platform, service, Arc::new(store.clone()))
            .with_timeouts(self.timeouts);

        TestHarness { store, ctx }
    }
}
