//! Configuration types shared across postcheck crates.
//!
//! - [`timeouts`]: how long and how often to poll the record store
//! - [`platform`]: identity of the platform under test

pub mod platform;
pub mod timeouts;

pub use platform::{Environment, Platform};
pub use timeouts::PollTimeouts;
