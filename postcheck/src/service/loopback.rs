//! In-process stand-in for a hosted mail service.
//!
//! Applies the acceptance rules of the hosted service (authorized senders,
//! blocked attachment types, a body is required) and, for accepted mail,
//! writes what a receiving mail handler would record into a
//! [`RecordStore`] after a short delay. Nothing leaves the process.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use postcheck_common::{MessageRecord, Platform, address::domain_of, outgoing};
use postcheck_store::{RecordCategory, RecordStore};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinSet};

use super::{
    BLOCKED_EXTENSIONS, INVALID_ATTACHMENT, MailService, OutgoingMessage, SendOutcome,
    UNAUTHORIZED_SENDER,
};

/// Subject prefix of bounce notifications.
pub const BOUNCE_PREFIX: &str = "BOUNCED:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackConfig {
    /// Delay between accepting a message and recording its delivery.
    ///
    /// Default: 100 milliseconds
    #[serde(default = "defaults::delivery_delay_ms")]
    pub delivery_delay_ms: u64,
}

impl LoopbackConfig {
    pub const fn delivery_delay(&self) -> Duration {
        Duration::from_millis(self.delivery_delay_ms)
    }
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            delivery_delay_ms: defaults::delivery_delay_ms(),
        }
    }
}

mod defaults {
    pub const fn delivery_delay_ms() -> u64 {
        100
    }
}

/// Clones share the set of in-flight deliveries, so [`MailService::flush`]
/// on any clone waits for all of them.
#[derive(Debug, Clone)]
pub struct LoopbackMailService {
    store: Arc<dyn RecordStore>,
    platform: Platform,
    delay: Duration,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl LoopbackMailService {
    pub fn new(store: Arc<dyn RecordStore>, platform: Platform, config: &LoopbackConfig) -> Self {
        Self {
            store,
            platform,
            delay: config.delivery_delay(),
            pending: Arc::default(),
        }
    }

    /// The administrator and any address at the application's mail domain
    /// may send.
    fn is_authorized(&self, sender: &str) -> bool {
        self.platform.admin_email.as_deref() == Some(sender)
            || domain_of(sender) == Some(self.platform.mail_domain().as_str())
    }

    fn validate(&self, message: &OutgoingMessage) -> Result<(), String> {
        let Some(sender) = message.sender.as_deref() else {
            return Err("Missing sender".to_string());
        };

        if !self.is_authorized(sender) {
            return Err(format!("{UNAUTHORIZED_SENDER}: {sender}"));
        }

        if message.text_body.is_none() && message.html_body.is_none() {
            return Err("Missing body".to_string());
        }

        if let Some(attachment) = message.attachments.iter().find(|attachment| {
            attachment
                .extension()
                .is_some_and(|extension| BLOCKED_EXTENSIONS.contains(&extension.as_str()))
        }) {
            return Err(format!("{INVALID_ATTACHMENT}: {}", attachment.file_name));
        }

        Ok(())
    }

    /// Record `records` after the delivery delay, without blocking the
    /// sender.
    async fn deliver_later(&self, records: Vec<(RecordCategory, MessageRecord)>) {
        let store = Arc::clone(&self.store);
        let delay = self.delay;

        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}

        pending.spawn(async move {
            tokio::time::sleep(delay).await;
            for (category, record) in records {
                if let Err(err) = store.append(category, record).await {
                    tracing::warn!(%category, "Failed to record delivery: {err}");
                }
            }
        });
    }
}

#[async_trait]
impl MailService for LoopbackMailService {
    async fn send(&self, message: &OutgoingMessage) -> SendOutcome {
        outgoing!(level = DEBUG, "send {:?}", message.subject);

        if let Err(reason) = self.validate(message) {
            outgoing!(level = INFO, "Rejected {:?}: {}", message.subject, reason);
            return SendOutcome::Rejected(reason);
        }
        if message.recipients().next().is_none() {
            return SendOutcome::Rejected("No recipients".to_string());
        }

        let domain = self.platform.mail_domain();
        let (local, remote): (Vec<&str>, Vec<&str>) = message
            .recipients()
            .partition(|recipient| domain_of(recipient) == Some(domain.as_str()));

        let mut records = Vec::new();
        if !local.is_empty() {
            records.push((RecordCategory::Delivered, received(message)));
        }
        if !remote.is_empty() {
            outgoing!(level = DEBUG, "Bouncing {:?} for {:?}", message.subject, remote);
            records.push((RecordCategory::Bounced, bounce(message)));
        }
        self.deliver_later(records).await;

        SendOutcome::Accepted
    }

    async fn send_to_admins(&self, message: &OutgoingMessage) -> SendOutcome {
        outgoing!(level = DEBUG, "send_to_admins {:?}", message.subject);

        if let Err(reason) = self.validate(message) {
            return SendOutcome::Rejected(reason);
        }

        match &self.platform.admin_email {
            Some(admin) => {
                let to_admin = OutgoingMessage {
                    to: vec![admin.clone()],
                    cc: Vec::new(),
                    bcc: Vec::new(),
                    ..message.clone()
                };
                self.deliver_later(vec![(RecordCategory::Delivered, received(&to_admin))])
                    .await;
            }
            None => {
                outgoing!(level = INFO, "No administrators configured, dropping {:?}", message.subject);
            }
        }

        SendOutcome::Accepted
    }

    async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(err) = result {
                tracing::warn!("Delivery task failed: {err}");
            }
        }
    }
}

/// What a receiving mail handler records for `message`.
///
/// A message with only a text body arrives as a plain body. Anything else
/// arrives as multipart: the text part (derived from the HTML when absent),
/// the HTML part, then each attachment.
fn received(message: &OutgoingMessage) -> MessageRecord {
    let mut builder = MessageRecord::builder();

    if let Some(subject) = &message.subject {
        builder = builder.subject(subject);
    }
    if let Some(sender) = &message.sender {
        builder = builder.from(sender);
    }
    builder = builder.to_all(&message.to);
    if !message.cc.is_empty() {
        builder = builder.cc(message.cc.join(", "));
    }
    if let Some(reply_to) = message.reply_to.as_ref().or(message.sender.as_ref()) {
        builder = builder.reply_to(reply_to);
    }

    let plain = message.html_body.is_none() && message.attachments.is_empty();
    match (&message.text_body, &message.html_body) {
        (Some(text), _) if plain => builder = builder.body(text),
        (text, html) => {
            if let Some(text) = text.clone().or_else(|| html.as_deref().map(html_to_text)) {
                builder = builder.part(text);
            }
            if let Some(html) = html {
                builder = builder.part(html);
            }
            for attachment in &message.attachments {
                builder = builder.part(String::from_utf8_lossy(&attachment.data));
            }
        }
    }

    for header in &message.headers {
        builder = builder.header_line(header.to_string());
    }

    builder.build()
}

fn bounce(message: &OutgoingMessage) -> MessageRecord {
    let mut builder = MessageRecord::builder().subject(format!(
        "{BOUNCE_PREFIX}{}",
        message.subject.as_deref().unwrap_or_default()
    ));
    if let Some(sender) = &message.sender {
        builder = builder.from(sender).to(sender);
    }
    builder.build()
}

/// Text content of an HTML fragment: tags dropped, whitespace collapsed.
fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
