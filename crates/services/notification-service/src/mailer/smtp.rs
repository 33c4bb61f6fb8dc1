//! SMTP mailer backed by lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use common::{AppError, AppResult, SmtpConfig};

use super::{DeliveryInfo, Mailer, SendError};

/// Sends messages through an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the relay transport. No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .map_err(|e| AppError::mail(format!("Invalid SMTP relay {}: {}", config.host, e)))?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        match config.credentials() {
            Some((username, password)) => {
                builder =
                    builder.credentials(Credentials::new(username.to_string(), password.to_string()));
            }
            None => tracing::warn!("SMTP credentials not configured"),
        }

        tracing::info!(host = %config.host, port = config.port, "SMTP mailer configured");

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, SendError> {
    address.parse().map_err(|e: lettre::address::AddressError| SendError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryInfo, SendError> {
        let message = Message::builder()
            .from(mailbox(from)?)
            .to(mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| SendError::Build(e.to_string()))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        Ok(DeliveryInfo {
            code: response.code().to_string(),
            response: response.message().collect::<Vec<_>>().join(" "),
        })
    }
}
