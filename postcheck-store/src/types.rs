use std::fmt;

use postcheck_common::MessageRecord;
use serde::{Deserialize, Serialize};

/// Identifier for a stored record.
///
/// ULIDs sort by creation time, so ordering ids orders records by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId {
    id: ulid::Ulid,
}

impl RecordId {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Milliseconds since the Unix epoch at which the record was stored.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Which log a record was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordCategory {
    /// Messages that reached their recipient.
    Delivered,
    /// Bounce notifications.
    Bounced,
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delivered => "delivered",
            Self::Bounced => "bounced",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub category: RecordCategory,
    pub record: MessageRecord,
}
