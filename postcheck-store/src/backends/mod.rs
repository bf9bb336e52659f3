//! Record store implementations
//!
//! - `memory`: In-memory store, shared by the loopback mail service and tests

pub mod memory;

pub use memory::MemoryRecordStore;
