use postcheck_common::{EmailMessageField, MessageRecord, address::unique_subject, outgoing};

use super::{Result, ScenarioContext, ScenarioError};
use crate::{
    headers::{expected_header_lines, pass_through_headers, verify_headers},
    service::{Attachment, BLOCKED_EXTENSIONS, Header, OutgoingMessage, SendOutcome},
};

const BODY: &str = "Simple message.";
const BOLD_TEXT: &str = "I am bold.";
const BOLD_HTML: &str = "<html><body><b>I am bold.</b></body></html>";

/// The outgoing message carrying the subject, sender and recipients of
/// `expected`.
fn outgoing_for(expected: &MessageRecord) -> OutgoingMessage {
    OutgoingMessage {
        sender: expected.from().map(str::to_string),
        to: expected.to().to_vec(),
        subject: expected.subject().map(str::to_string),
        ..OutgoingMessage::default()
    }
}

fn ensure_eq<T>(field: &str, expected: &T, actual: &T) -> Result<()>
where
    T: PartialEq + std::fmt::Debug + ?Sized,
{
    if expected == actual {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(format!(
            "send modified {field}: expected {expected:?}, found {actual:?}"
        )))
    }
}

pub(super) async fn basic_message(ctx: &ScenarioContext) -> Result<()> {
    let expected = MessageRecord::builder()
        .subject(unique_subject("Basic-Message-Test"))
        .from(ctx.address("from-basic-test", EmailMessageField::From))
        .to(ctx.address("to-basic-test", EmailMessageField::To))
        .body(BODY)
        .build();

    let message = OutgoingMessage {
        text_body: Some(BODY.to_string()),
        ..outgoing_for(&expected)
    };
    ctx.send(&message).await?;

    ctx.assert_message_received(expected).await?;
    Ok(())
}

pub(super) async fn full_message(ctx: &ScenarioContext) -> Result<()> {
    let cc = ctx.address("cc-test-full", EmailMessageField::Cc);
    let bcc = ctx.address("bcc-test-full", EmailMessageField::Bcc);
    let reply_to = ctx.address("replyto-test-full", EmailMessageField::ReplyTo);

    let expected = MessageRecord::builder()
        .subject(unique_subject("Full-Message-Test"))
        .from(ctx.address("from-test-full", EmailMessageField::From))
        .to(ctx.address("to-test-full", EmailMessageField::To))
        .cc(&cc)
        .bcc(&bcc)
        .reply_to(&reply_to)
        .part(BOLD_TEXT)
        .part(BOLD_HTML)
        .build();

    let message = OutgoingMessage {
        cc: vec![cc.clone()],
        bcc: vec![bcc.clone()],
        reply_to: Some(reply_to.clone()),
        text_body: Some(BOLD_TEXT.to_string()),
        html_body: Some(BOLD_HTML.to_string()),
        ..outgoing_for(&expected)
    };
    ctx.send(&message).await?;

    ensure_eq("subject", &expected.subject(), &message.subject.as_deref())?;
    ensure_eq("to", expected.to(), message.to.as_slice())?;
    ensure_eq("sender", &expected.from(), &message.sender.as_deref())?;
    ensure_eq("cc", &[cc][..], message.cc.as_slice())?;
    ensure_eq("bcc", &[bcc][..], message.bcc.as_slice())?;
    ensure_eq("reply-to", &Some(reply_to), &message.reply_to)?;
    ensure_eq("text body", &Some(BOLD_TEXT), &message.text_body.as_deref())?;
    ensure_eq("html body", &Some(BOLD_HTML), &message.html_body.as_deref())?;

    ctx.assert_message_received(expected).await?;
    Ok(())
}

pub(super) async fn valid_attachment(ctx: &ScenarioContext) -> Result<()> {
    const DATA: &str = "I'm attached to these valid bytes.";

    let expected = MessageRecord::builder()
        .subject(unique_subject("Valid-Attachment-Test"))
        .from(ctx.address("from-test-valid-attachment", EmailMessageField::From))
        .to(ctx.address("to-test-valid-attachment", EmailMessageField::To))
        .part(BODY)
        .part(DATA)
        .build();

    let message = OutgoingMessage {
        text_body: Some(BODY.to_string()),
        attachments: vec![Attachment::new("test-attach.txt", DATA)],
        ..outgoing_for(&expected)
    };
    ctx.send(&message).await?;

    ctx.assert_message_received(expected).await?;
    Ok(())
}

pub(super) async fn invalid_attachment(ctx: &ScenarioContext) -> Result<()> {
    for extension in BLOCKED_EXTENSIONS {
        let message = OutgoingMessage {
            sender: Some(ctx.address("from-test-invalid-attachment", EmailMessageField::From)),
            to: vec![ctx.address("to-test-invalid-attachment", EmailMessageField::To)],
            subject: Some(unique_subject(&format!(
                "Invalid-Attachment-Test-{extension}"
            ))),
            text_body: Some(BODY.to_string()),
            attachments: vec![Attachment::new(
                format!("test-attach.{extension}"),
                "I've got an invalid file type.",
            )],
            ..OutgoingMessage::default()
        };

        if ctx.service.send(&message).await.is_accepted() {
            return Err(ScenarioError::UnexpectedAcceptance(format!(
                "invalid attachment type {extension}"
            )));
        }
    }

    Ok(())
}

/// Sends to an address nobody receives at. Whether the bounce arrives is
/// left to the bounce records; nothing is asserted here.
pub(super) async fn bounce_notification(ctx: &ScenarioContext) -> Result<()> {
    let subject = unique_subject("Bounce-Notification-Test");
    let message = OutgoingMessage {
        sender: Some(ctx.address("from-test-bounce", EmailMessageField::From)),
        to: vec![format!(
            "{}bogus",
            ctx.address("to-test-bounce", EmailMessageField::To)
        )],
        subject: Some(subject.clone()),
        text_body: Some(BODY.to_string()),
        ..OutgoingMessage::default()
    };
    ctx.send(&message).await?;

    outgoing!(level = INFO, "Sent {subject} to an undeliverable address");
    Ok(())
}

pub(super) async fn allowed_headers(ctx: &ScenarioContext) -> Result<()> {
    let expected = MessageRecord::builder()
        .subject(unique_subject("Allowed-Headers-Test"))
        .from(ctx.address("from-test-header", EmailMessageField::From))
        .to(ctx.address("to-test-header", EmailMessageField::To))
        .body(BODY)
        .build();

    let headers = pass_through_headers();
    let message = OutgoingMessage {
        text_body: Some(BODY.to_string()),
        headers: headers
            .iter()
            .map(|(name, value)| Header::new(*name, *value))
            .collect(),
        ..outgoing_for(&expected)
    };
    ctx.send(&message).await?;

    let received = ctx.assert_message_received(expected).await?;
    verify_headers(&received, &expected_header_lines(&headers))?;
    Ok(())
}

/// Acceptance is the pass condition; administrators' inboxes are not
/// observable.
pub(super) async fn send_to_admins(ctx: &ScenarioContext) -> Result<()> {
    let message = OutgoingMessage {
        sender: Some(ctx.address("from-admin-test", EmailMessageField::From)),
        subject: Some(unique_subject("Send-to-admin")),
        text_body: Some(BODY.to_string()),
        ..OutgoingMessage::default()
    };

    match ctx.service.send_to_admins(&message).await {
        SendOutcome::Accepted => Ok(()),
        SendOutcome::Rejected(reason) => Err(ScenarioError::Rejected(reason)),
    }
}

pub(super) async fn html_to_text(ctx: &ScenarioContext) -> Result<()> {
    let expected = MessageRecord::builder()
        .subject(unique_subject("Automatic-Html-To-Text-Conversion-Test"))
        .from(ctx.address("from-test-htmltext", EmailMessageField::From))
        .to(ctx.address("to-test-htmltext", EmailMessageField::To))
        .part(BOLD_TEXT)
        .part(BOLD_HTML)
        .build();

    let message = OutgoingMessage {
        html_body: Some(BOLD_HTML.to_string()),
        ..outgoing_for(&expected)
    };
    ctx.send(&message).await?;

    ctx.assert_message_received(expected).await?;
    Ok(())
}

pub(super) async fn authorized_admin_sender(ctx: &ScenarioContext) -> Result<()> {
    let sender = ctx.platform.admin_email()?.to_string();
    assert_sender_authorized(ctx, &sender).await
}

pub(super) async fn authorized_gateway_sender(ctx: &ScenarioContext) -> Result<()> {
    let sender = format!("any_user@{}", ctx.platform.mail_domain());
    assert_sender_authorized(ctx, &sender).await
}

pub(super) async fn unauthorized_sender(ctx: &ScenarioContext) -> Result<()> {
    let message = OutgoingMessage {
        sender: Some("someone_else@google.com".to_string()),
        to: vec![ctx.address("to-unauthorized-sender-test", EmailMessageField::To)],
        subject: Some(unique_subject("Test-Unauthorized-Sender")),
        text_body: Some(BODY.to_string()),
        ..OutgoingMessage::default()
    };

    match ctx.service.send(&message).await {
        SendOutcome::Accepted => Err(ScenarioError::UnexpectedAcceptance(
            "expected rejection with \"Unauthorized Sender\"".to_string(),
        )),
        outcome if outcome.is_unauthorized_sender() => Ok(()),
        outcome => Err(ScenarioError::Assertion(format!(
            "expected rejection to contain \"Unauthorized Sender\", got {outcome}"
        ))),
    }
}

async fn assert_sender_authorized(ctx: &ScenarioContext, sender: &str) -> Result<()> {
    let message = OutgoingMessage {
        sender: Some(sender.to_string()),
        to: vec![ctx.address("to-authorized-sender-test", EmailMessageField::To)],
        subject: Some(unique_subject("Test-Authorized-Sender")),
        text_body: Some(BODY.to_string()),
        ..OutgoingMessage::default()
    };

    match ctx.service.send(&message).await {
        SendOutcome::Accepted => Ok(()),
        outcome if outcome.is_unauthorized_sender() => Err(ScenarioError::Assertion(format!(
            "Could not send mail with sender set to '{sender}'. Got {outcome}"
        ))),
        SendOutcome::Rejected(reason) => Err(ScenarioError::Rejected(reason)),
    }
}
