pub mod backends;
pub mod config;
pub mod error;
pub mod r#trait;
pub mod types;

pub use backends::MemoryRecordStore;
pub use config::{MemoryConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use r#trait::{MIN_INTERVAL, RecordFilter, RecordStore};
pub use types::{RecordCategory, RecordId, StoredRecord};
