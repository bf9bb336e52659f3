//! Conformance kit for mail-sending APIs.
//!
//! A scenario sends mail through a [`MailService`], then waits for the
//! [`RecordStore`](postcheck_store::RecordStore) to show a record that
//! satisfies the expected [`MessageRecord`](postcheck_common::MessageRecord).

pub mod controller;
pub mod headers;
pub mod matcher;
pub mod poll;
pub mod scenario;
pub mod service;
pub mod suite;

pub use controller::Postcheck;
pub use headers::{HeaderError, verify_headers};
pub use matcher::{MatchFn, matches};
pub use poll::{PollError, PollRequest, poll_for_match};
pub use scenario::{Scenario, ScenarioContext, ScenarioError};
pub use service::{MailService, OutgoingMessage, SendOutcome};
pub use suite::{Outcome, SuiteReport, run_suite};
