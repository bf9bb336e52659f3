//! Structured snapshot of an email's externally observable fields.
//!
//! A [`MessageRecord`] is built once, either as the expected outcome of a
//! scenario or by a record store when a delivered message is observed, and
//! is only ever compared afterwards. There is no structural equality;
//! comparison rules differ per field and live with the matcher.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageRecord {
    subject: Option<String>,
    from: Option<String>,
    #[serde(default)]
    to: Vec<String>,
    cc: Option<String>,
    bcc: Option<String>,
    reply_to: Option<String>,
    body: Option<String>,
    #[serde(default)]
    parts: Vec<String>,
    #[serde(default)]
    headers: Vec<String>,
}

impl MessageRecord {
    #[must_use]
    pub fn builder() -> MessageRecordBuilder {
        MessageRecordBuilder::default()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Recipients in the order they were given.
    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> Option<&str> {
        self.cc.as_deref()
    }

    pub fn bcc(&self) -> Option<&str> {
        self.bcc.as_deref()
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Multipart segments, e.g. the text part followed by the HTML part.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Header lines in `Name: Value` form.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub const fn is_reply_to_set(&self) -> bool {
        self.reply_to.is_some()
    }

    /// `true` when a body was given, even an empty one. An unset body means
    /// the multipart segments carry the content.
    pub const fn is_body_set(&self) -> bool {
        self.body.is_some()
    }

    /// The explicit reply-to, or the sender when none was set.
    pub fn effective_reply_to(&self) -> Option<&str> {
        self.reply_to().or_else(|| self.from())
    }

    /// Whether `line` occurs literally in the header collection.
    pub fn has_header(&self, line: &str) -> bool {
        self.headers.iter().any(|header| header == line)
    }
}

struct Optional<'a>(Option<&'a str>);

impl fmt::Display for Optional<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "'{value}'"),
            None => f.write_str("null"),
        }
    }
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MessageRecord{{subject={}, from={}, to={:?}, cc={}, bcc={}, replyTo={}, body={}, parts={:?}, headers={:?}}}",
            Optional(self.subject()),
            Optional(self.from()),
            self.to,
            Optional(self.cc()),
            Optional(self.bcc()),
            Optional(self.reply_to()),
            Optional(self.body()),
            self.parts,
            self.headers,
        )
    }
}

/// Consuming builder for [`MessageRecord`]. No validation is performed.
#[derive(Debug, Default)]
#[must_use]
pub struct MessageRecordBuilder {
    record: MessageRecord,
}

impl MessageRecordBuilder {
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.record.subject = Some(subject.into());
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.record.from = Some(from.into());
        self
    }

    /// Append a recipient.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.record.to.push(to.into());
        self
    }

    pub fn to_all<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record.to.extend(recipients.into_iter().map(Into::into));
        self
    }

    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.record.cc = Some(cc.into());
        self
    }

    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.record.bcc = Some(bcc.into());
        self
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.record.reply_to = Some(reply_to.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.record.body = Some(body.into());
        self
    }

    /// Append a multipart segment.
    pub fn part(mut self, part: impl Into<String>) -> Self {
        self.record.parts.push(part.into());
        self
    }

    /// Append a header line, already in `Name: Value` form.
    pub fn header_line(mut self, line: impl Into<String>) -> Self {
        self.record.headers.push(line.into());
        self
    }

    pub fn header(self, name: &str, value: &str) -> Self {
        self.header_line(format!("{name}: {value}"))
    }

    pub fn build(self) -> MessageRecord {
        self.record
    }
}
