pub mod address;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;

pub use address::{AddressFormatter, EmailMessageField, GatewayAddressFormatter};
pub use config::{Environment, Platform, PollTimeouts};
pub use error::ConfigError;
pub use record::{MessageRecord, MessageRecordBuilder};
pub use tracing;
