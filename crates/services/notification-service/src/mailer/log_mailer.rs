//! Development mailer that logs messages instead of sending them.

use async_trait::async_trait;

use super::{DeliveryInfo, Mailer, SendError};

/// Writes every message to the log and reports success.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryInfo, SendError> {
        tracing::info!(
            "=== EMAIL (not sent) ===\n\
             From: {}\n\
             To: {}\n\
             Subject: {}\n\
             Body:\n{}\n\
             ========================",
            from,
            to,
            subject,
            html_body
        );

        Ok(DeliveryInfo {
            code: "250".to_string(),
            response: "logged".to_string(),
        })
    }
}
