use std::sync::Arc;

use serde::Deserialize;

use crate::{backends::MemoryRecordStore, r#trait::RecordStore};

/// Configuration for the record store
///
/// Memory-backed store (unlimited capacity):
/// ```ron
/// Postcheck (
///     store: Memory(()),
/// )
/// ```
///
/// Memory-backed store with capacity limit:
/// ```ron
/// Postcheck (
///     store: Memory((
///         capacity: Some(1000),
///     )),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    Memory(MemoryConfig),
}

/// Configuration for the memory-backed store
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryConfig {
    /// Maximum number of records to hold (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory(MemoryConfig::default())
    }
}

impl StoreConfig {
    /// Build the configured store
    #[must_use]
    pub fn into_record_store(self) -> Arc<dyn RecordStore> {
        match self {
            Self::Memory(config) => Arc::new(config.into_memory_store()),
        }
    }
}

impl MemoryConfig {
    #[must_use]
    pub fn into_memory_store(self) -> MemoryRecordStore {
        self.capacity
            .map_or_else(MemoryRecordStore::new, MemoryRecordStore::with_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_from_ron() {
        let config: StoreConfig = ron::from_str("Memory((capacity: Some(10)))").expect("valid ron");
        let StoreConfig::Memory(memory) = config;
        assert_eq!(memory.capacity, Some(10));
        assert_eq!(memory.into_memory_store().capacity(), Some(10));
    }

    #[test]
    fn test_default_is_unbounded_memory() {
        let StoreConfig::Memory(memory) = StoreConfig::default();
        assert_eq!(memory.into_memory_store().capacity(), None);
    }
}
