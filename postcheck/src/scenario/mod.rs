//! Conformance scenarios.
//!
//! Each [`Scenario`] drives the mail service through a [`ScenarioContext`]
//! and either returns `Ok(())` or the first [`ScenarioError`] it hit.
//! Scenarios never read ambient state: the platform identity, the service,
//! the record store and the timings all come from the context.

mod cases;

use std::{fmt, str::FromStr, sync::Arc};

use postcheck_common::{
    AddressFormatter, ConfigError, EmailMessageField, Environment, GatewayAddressFormatter,
    MessageRecord, Platform, PollTimeouts,
};
use postcheck_store::RecordStore;
use thiserror::Error;

use crate::{
    headers::HeaderError,
    poll::{PollError, PollRequest},
    service::{MailService, OutgoingMessage, SendOutcome},
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Headers(#[from] HeaderError),

    /// The service refused a message the scenario expected it to accept.
    #[error("Send was rejected: {0}")]
    Rejected(String),

    /// The service accepted a message the scenario expected it to refuse.
    #[error("Send was accepted: {0}")]
    UnexpectedAcceptance(String),

    #[error("{0}")]
    Assertion(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown scenario: {0}")]
    Unknown(String),
}

pub type Result<T, E = ScenarioError> = std::result::Result<T, E>;

/// Everything a scenario may touch.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub platform: Platform,
    pub formatter: Arc<dyn AddressFormatter>,
    pub service: Arc<dyn MailService>,
    pub store: Arc<dyn RecordStore>,
    pub timeouts: PollTimeouts,
}

impl ScenarioContext {
    pub fn new(
        platform: Platform,
        service: Arc<dyn MailService>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            platform,
            formatter: Arc::new(GatewayAddressFormatter),
            service,
            store,
            timeouts: PollTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn AddressFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: PollTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Address of `user` on the platform under test.
    pub fn address(&self, user: &str, field: EmailMessageField) -> String {
        self.platform.address(self.formatter.as_ref(), user, field)
    }

    /// A poll request for `expected` using the configured timings.
    pub fn poll_request(&self, expected: MessageRecord) -> PollRequest {
        PollRequest::new(expected).timeouts(&self.timeouts)
    }

    /// Wait for a delivered record matching `expected`.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::Poll`] on timeout or store failure.
    pub async fn assert_message_received(&self, expected: MessageRecord) -> Result<MessageRecord> {
        Ok(self.poll_request(expected).run(self.store.as_ref()).await?)
    }

    /// Send `message`, treating a rejection as a failure.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::Rejected`] if the service refuses the message.
    pub async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        match self.service.send(message).await {
            SendOutcome::Accepted => Ok(()),
            SendOutcome::Rejected(reason) => Err(ScenarioError::Rejected(reason)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    BasicMessage,
    FullMessage,
    ValidAttachment,
    InvalidAttachment,
    BounceNotification,
    AllowedHeaders,
    SendToAdmins,
    HtmlToText,
    AuthorizedAdminSender,
    AuthorizedGatewaySender,
    UnauthorizedSender,
}

/// Environments in which mail is actually delivered somewhere observable.
const DELIVERING: &[Environment] = &[
    Environment::Appspot,
    Environment::Capedwarf,
    Environment::Loopback,
];

const ANY: &[Environment] = &[
    Environment::Appspot,
    Environment::Capedwarf,
    Environment::Sdk,
    Environment::Loopback,
];

impl Scenario {
    pub const ALL: [Self; 11] = [
        Self::BasicMessage,
        Self::FullMessage,
        Self::ValidAttachment,
        Self::InvalidAttachment,
        Self::BounceNotification,
        Self::AllowedHeaders,
        Self::SendToAdmins,
        Self::HtmlToText,
        Self::AuthorizedAdminSender,
        Self::AuthorizedGatewaySender,
        Self::UnauthorizedSender,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::BasicMessage => "basic_message",
            Self::FullMessage => "full_message",
            Self::ValidAttachment => "valid_attachment",
            Self::InvalidAttachment => "invalid_attachment",
            Self::BounceNotification => "bounce_notification",
            Self::AllowedHeaders => "allowed_headers",
            Self::SendToAdmins => "send_to_admins",
            Self::HtmlToText => "html_to_text",
            Self::AuthorizedAdminSender => "authorized_admin_sender",
            Self::AuthorizedGatewaySender => "authorized_gateway_sender",
            Self::UnauthorizedSender => "unauthorized_sender",
        }
    }

    /// Environments the scenario is meaningful in.
    pub const fn environments(self) -> &'static [Environment] {
        match self {
            Self::BasicMessage
            | Self::FullMessage
            | Self::ValidAttachment
            | Self::AllowedHeaders
            | Self::HtmlToText => DELIVERING,
            Self::InvalidAttachment
            | Self::BounceNotification
            | Self::SendToAdmins
            | Self::AuthorizedAdminSender
            | Self::AuthorizedGatewaySender
            | Self::UnauthorizedSender => ANY,
        }
    }

    /// Why the scenario cannot run against `platform`, if it cannot.
    pub fn skip_reason(self, platform: &Platform) -> Option<String> {
        if !self.environments().contains(&platform.environment) {
            return Some(format!("not applicable to {}", platform.environment));
        }

        if self == Self::AuthorizedAdminSender && platform.admin_email.is_none() {
            return Some("no administrator configured".to_string());
        }

        None
    }

    /// Run the scenario once.
    ///
    /// # Errors
    ///
    /// The first failure the scenario encountered.
    pub async fn run(self, ctx: &ScenarioContext) -> Result<()> {
        match self {
            Self::BasicMessage => cases::basic_message(ctx).await,
            Self::FullMessage => cases::full_message(ctx).await,
            Self::ValidAttachment => cases::valid_attachment(ctx).await,
            Self::InvalidAttachment => cases::invalid_attachment(ctx).await,
            Self::BounceNotification => cases::bounce_notification(ctx).await,
            Self::AllowedHeaders => cases::allowed_headers(ctx).await,
            Self::SendToAdmins => cases::send_to_admins(ctx).await,
            Self::HtmlToText => cases::html_to_text(ctx).await,
            Self::AuthorizedAdminSender => cases::authorized_admin_sender(ctx).await,
            Self::AuthorizedGatewaySender => cases::authorized_gateway_sender(ctx).await,
            Self::UnauthorizedSender => cases::unauthorized_sender(ctx).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ScenarioError::Unknown(s.to_string()))
    }
}
