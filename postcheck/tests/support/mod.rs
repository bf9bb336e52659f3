//! Test support utilities for scenario testing
//!
//! Wires the memory record store and the loopback mail service together
//! with short timings so whole scenarios run in-process.

pub mod harness;

pub use harness::TestHarness;
