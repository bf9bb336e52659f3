use std::fmt;

use serde::{Deserialize, Serialize};

/// The message field an address is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailMessageField {
    From,
    To,
    Cc,
    Bcc,
    ReplyTo,
}

impl fmt::Display for EmailMessageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
            Self::ReplyTo => "reply-to",
        })
    }
}

/// Builds test addresses for a given platform.
///
/// Some deployments route mail through gateways that need a field specific
/// address shape; those provide their own formatter.
pub trait AddressFormatter: Send + Sync + fmt::Debug {
    fn format(&self, user: &str, app_id: &str, gateway: &str, field: EmailMessageField) -> String;
}

/// `user@<app_id>.<gateway>`, independent of the field.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayAddressFormatter;

impl AddressFormatter for GatewayAddressFormatter {
    fn format(&self, user: &str, app_id: &str, gateway: &str, _field: EmailMessageField) -> String {
        format!("{user}@{app_id}.{gateway}")
    }
}

/// Returns the domain part of `address`, if it has one.
pub fn domain_of(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// A subject made unique per scenario run by a millisecond timestamp suffix.
///
/// Scenarios share one record store, so the subject is what keeps one
/// scenario from matching another's mail.
pub fn unique_subject(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp_millis())
}
