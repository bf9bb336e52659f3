//! Error types for the postcheck-store crate.

use thiserror::Error;

/// Top-level record store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused a write because it is full.
    #[error("Record store capacity exceeded: {len}/{capacity} records")]
    CapacityExceeded { len: usize, capacity: usize },

    /// The backend failed to serve the request.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let err = StoreError::CapacityExceeded {
            len: 2,
            capacity: 2,
        };
        assert_eq!(err.to_string(), "Record store capacity exceeded: 2/2 records");
    }
}
