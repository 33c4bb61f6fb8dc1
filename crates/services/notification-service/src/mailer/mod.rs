//! Outbound email.
//!
//! The notification job only sees the [`Mailer`] trait. Production sends
//! through an SMTP relay; development can log messages instead.

mod log_mailer;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use common::AppResult;

use crate::config::{MailTransport, NotificationServiceConfig};

pub use log_mailer::LogMailer;
pub use smtp::SmtpMailer;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// What the transport reported for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryInfo {
    /// Reply code, e.g. "250"
    pub code: String,
    /// Reply text
    pub response: String,
}

/// Failure to hand one message to the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("could not build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Email sender trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one HTML email.
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryInfo, SendError>;
}

/// Build the mailer selected by `MAIL_TRANSPORT`.
pub fn build_mailer(config: &NotificationServiceConfig) -> AppResult<Arc<dyn Mailer>> {
    match config.mail_transport {
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(&config.smtp)?)),
        MailTransport::Log => {
            tracing::warn!("MAIL_TRANSPORT=log - emails will be logged instead of sent");
            Ok(Arc::new(LogMailer))
        }
    }
}
