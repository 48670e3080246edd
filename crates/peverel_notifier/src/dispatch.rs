//! Digest delivery.
//!
//! # Responsibility
//! - Define the dispatcher seam the scheduler hands rendered digests to.
//! - Deliver digests as HTML email over async SMTP.
//!
//! # Invariants
//! - A dispatcher never retries on its own; the scheduler's next tick is the
//!   retry.
//! - Credentials are attached only when both username and password are set.

use crate::config::SmtpSettings;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure to hand a digest to the mail system.
#[derive(Debug)]
pub enum DispatchError {
    /// Sender or recipient address could not be parsed.
    Address(String),
    /// Message could not be assembled.
    Message(String),
    /// SMTP transport setup or delivery failed.
    Transport(String),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(message) => write!(f, "invalid email address: {message}"),
            Self::Message(message) => write!(f, "failed to build email: {message}"),
            Self::Transport(message) => write!(f, "smtp delivery failed: {message}"),
        }
    }
}

impl Error for DispatchError {}

/// Sends a rendered digest to a list of recipients.
#[async_trait]
pub trait DigestDispatcher: Send + Sync {
    async fn send_digest(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError>;
}

#[async_trait]
impl<D: DigestDispatcher + ?Sized> DigestDispatcher for std::sync::Arc<D> {
    async fn send_digest(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        (**self).send_digest(recipients, subject, body).await
    }
}

/// HTML email dispatcher backed by `lettre`'s async SMTP transport.
#[derive(Debug)]
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpDispatcher {
    /// Builds the transport. No connection is opened until the first send.
    ///
    /// Port 465 uses implicit TLS, other ports use STARTTLS unless `tls` is
    /// off.
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, DispatchError> {
        let from: Mailbox = settings
            .sender
            .parse()
            .map_err(|err: lettre::address::AddressError| DispatchError::Address(err.to_string()))?;

        let builder = if settings.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .map_err(|err| DispatchError::Transport(err.to_string()))?
        } else if settings.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
                .map_err(|err| DispatchError::Transport(err.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        };
        let mut builder = builder.port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl DigestDispatcher for SmtpDispatcher {
    async fn send_digest(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        let email = build_message(&self.from, recipients, subject, body)?;

        self.transport
            .send(email)
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        info!(
            "event=digest_dispatch module=dispatch status=ok recipients={}",
            recipients.len()
        );
        Ok(())
    }
}

fn build_message(
    from: &Mailbox,
    recipients: &[String],
    subject: &str,
    body: &str,
) -> Result<Message, DispatchError> {
    if recipients.is_empty() {
        return Err(DispatchError::Address(
            "at least one recipient is required".to_string(),
        ));
    }

    let mut builder = Message::builder().from(from.clone()).subject(subject);
    for recipient in recipients {
        let mailbox: Mailbox = recipient
            .parse()
            .map_err(|err: lettre::address::AddressError| {
                DispatchError::Address(format!("{recipient}: {err}"))
            })?;
        builder = builder.to(mailbox);
    }

    builder
        .header(ContentType::TEXT_HTML)
        .body(body.to_string())
        .map_err(|err| DispatchError::Message(err.to_string()))
}
