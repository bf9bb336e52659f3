//! The mail-sending API under test.
//!
//! [`MailService`] is the narrow interface scenarios drive. Rejections are
//! values, not errors: a scenario asserting that a sender is refused matches
//! on [`SendOutcome::Rejected`] the same way one asserting acceptance
//! matches on [`SendOutcome::Accepted`].

pub mod loopback;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use loopback::{LoopbackConfig, LoopbackMailService};

/// Reason given when the sender may not send on behalf of the application.
pub const UNAUTHORIZED_SENDER: &str = "Unauthorized Sender";

/// Reason given for attachments of a blocked file type.
pub const INVALID_ATTACHMENT: &str = "Invalid attachment type";

/// Attachment extensions the hosted service refuses to send.
pub const BLOCKED_EXTENSIONS: &[&str] = &[
    "ade", "adp", "bat", "chm", "cmd", "com", "cpl", "exe", "hta", "ins", "isp", "jse", "lib",
    "mde", "msc", "msp", "mst", "pif", "scr", "sct", "shb", "sys", "vb", "vbe", "vbs", "vxd",
    "wsc", "wsf", "wsh",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase())
            .filter(|extension| !extension.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// A message as handed to the mail service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub sender: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<Attachment>,
    pub headers: Vec<Header>,
}

impl OutgoingMessage {
    /// Every recipient: to, then cc, then bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }
}

/// Result of handing a message to the mail service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    Rejected(String),
}

impl SendOutcome {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn rejection(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(reason.as_str()),
        }
    }

    pub fn is_unauthorized_sender(&self) -> bool {
        self.rejection()
            .is_some_and(|reason| reason.contains(UNAUTHORIZED_SENDER))
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

#[async_trait]
pub trait MailService: Send + Sync + fmt::Debug {
    /// Send `message` to its recipients.
    async fn send(&self, message: &OutgoingMessage) -> SendOutcome;

    /// Send `message` to the application's administrators, ignoring its
    /// recipients.
    async fn send_to_admins(&self, message: &OutgoingMessage) -> SendOutcome;

    /// Wait until every message accepted so far has reached the record
    /// store. Services whose deliveries cannot be observed keep the no-op.
    async fn flush(&self) {}
}
