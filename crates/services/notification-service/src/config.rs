//! Notification service configuration.

use std::env;

use chrono::{Duration, FixedOffset, NaiveTime, Offset, Utc};

use common::{AppError, AppResult, DatabaseConfig, ServiceConfig, SmtpConfig};
use domain::DEFAULT_NOTIFICATION_COOLDOWN_MINUTES;

/// Which transport delivers digest emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    /// Send through the configured SMTP relay
    Smtp,
    /// Log emails instead of sending them (development)
    Log,
}

impl MailTransport {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "log" => MailTransport::Log,
            _ => MailTransport::Smtp,
        }
    }
}

/// What happens to a digest whose send failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedSendPolicy {
    /// Log the failure and forget the digest
    Abandon,
    /// Re-send on the next pass, up to `max_attempts` total attempts
    RetryNextPass { max_attempts: u32 },
}

/// Sender identity and link base resolved for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub address: String,
    pub base_url: String,
}

/// Settings consumed by the notification job.
#[derive(Clone)]
pub struct NotificationSettings {
    /// Sender address (`NOTIFICATION_EMAIL`)
    pub sender_address: Option<String>,
    /// Sender credentials (`NOTIFICATION_PASSWORD`)
    pub sender_password: Option<String>,
    /// Base URL of the web application, used for migration links
    pub base_url: Option<String>,
    /// Minimum time between two passes
    pub cooldown: Duration,
    /// Offset that decides which calendar day "today" is
    pub utc_offset: FixedOffset,
    /// Maximum number of digests sent in parallel
    pub send_concurrency: usize,
    pub failed_send_policy: FailedSendPolicy,
}

impl std::fmt::Debug for NotificationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSettings")
            .field("sender_address", &self.sender_address)
            .field("sender_password", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("cooldown", &self.cooldown)
            .field("utc_offset", &self.utc_offset)
            .field("send_concurrency", &self.send_concurrency)
            .field("failed_send_policy", &self.failed_send_policy)
            .finish()
    }
}

impl NotificationSettings {
    /// Resolve the settings every pass requires.
    ///
    /// Fails with [`AppError::Configuration`] naming the first missing
    /// variable.
    pub fn sender(&self) -> AppResult<Sender> {
        let address = required(&self.sender_address, "NOTIFICATION_EMAIL")?;
        required(&self.sender_password, "NOTIFICATION_PASSWORD")?;
        let base_url = required(&self.base_url, "BASE_URL")?;

        Ok(Sender {
            address: address.to_string(),
            base_url: base_url.to_string(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::configuration(format!("Set {} in .env to use notifications", name))
        })
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sender_address: None,
            sender_password: None,
            base_url: None,
            cooldown: Duration::minutes(DEFAULT_NOTIFICATION_COOLDOWN_MINUTES),
            utc_offset: Utc.fix(),
            send_concurrency: 4,
            failed_send_policy: FailedSendPolicy::Abandon,
        }
    }
}

/// Notification service configuration.
#[derive(Debug, Clone)]
pub struct NotificationServiceConfig {
    /// HTTP bind address
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub mail_transport: MailTransport,
    pub notifications: NotificationSettings,
    /// Local time of day at which the built-in scheduler runs a pass
    pub send_at: NaiveTime,
}

impl NotificationServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sender_address = non_empty_var("NOTIFICATION_EMAIL");
        let sender_password = non_empty_var("NOTIFICATION_PASSWORD");

        let retry_failed = env::var("NOTIFICATION_RETRY_FAILED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let failed_send_policy = if retry_failed {
            FailedSendPolicy::RetryNextPass {
                max_attempts: parsed_var("NOTIFICATION_MAX_SEND_ATTEMPTS").unwrap_or(3),
            }
        } else {
            FailedSendPolicy::Abandon
        };

        let utc_offset = parsed_var::<i32>("NOTIFICATION_UTC_OFFSET_MINUTES")
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or(defaults.notifications.utc_offset);

        Self {
            service: ServiceConfig {
                service_name: "notification-service".to_string(),
                host: env::var("NOTIFICATION_SERVICE_HOST").unwrap_or(defaults.service.host),
                port: parsed_var("NOTIFICATION_SERVICE_PORT").unwrap_or(defaults.service.port),
            },
            database: DatabaseConfig {
                url: env::var("NOTIFICATION_SERVICE_DATABASE_URL")
                    .or_else(|_| env::var("DATABASE_URL"))
                    .unwrap_or(defaults.database.url),
                max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(defaults.database.max_connections),
                min_connections: parsed_var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(defaults.database.min_connections),
                timeout_seconds: parsed_var("DATABASE_TIMEOUT_SECONDS")
                    .unwrap_or(defaults.database.timeout_seconds),
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or(defaults.smtp.host),
                port: parsed_var("SMTP_PORT").unwrap_or(defaults.smtp.port),
                starttls: env::var("SMTP_STARTTLS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(defaults.smtp.starttls),
                username: sender_address.clone(),
                password: sender_password.clone(),
                timeout_seconds: parsed_var("SMTP_TIMEOUT_SECONDS")
                    .unwrap_or(defaults.smtp.timeout_seconds),
            },
            mail_transport: env::var("MAIL_TRANSPORT")
                .map(|v| MailTransport::parse(&v))
                .unwrap_or(defaults.mail_transport),
            notifications: NotificationSettings {
                sender_address,
                sender_password,
                base_url: non_empty_var("BASE_URL"),
                cooldown: parsed_var::<i64>("NOTIFICATION_COOLDOWN_MINUTES")
                    .map(Duration::minutes)
                    .unwrap_or(defaults.notifications.cooldown),
                utc_offset,
                send_concurrency: parsed_var::<usize>("NOTIFICATION_SEND_CONCURRENCY")
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.notifications.send_concurrency),
                failed_send_policy,
            },
            send_at: env::var("NOTIFICATION_SEND_AT")
                .ok()
                .and_then(|v| NaiveTime::parse_from_str(&v, "%H:%M").ok())
                .unwrap_or(defaults.send_at),
        }
    }
}

impl NotificationServiceConfig {
    /// Replace the configured bind address with command-line values, where given.
    pub fn with_bind_override(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.service.host = host;
        }
        if let Some(port) = port {
            self.service.port = port;
        }
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for NotificationServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "notification-service".to_string(),
                ..ServiceConfig::default()
            },
            database: DatabaseConfig::default(),
            smtp: SmtpConfig::default(),
            mail_transport: MailTransport::Smtp,
            notifications: NotificationSettings::default(),
            send_at: NaiveTime::from_hms_opt(8, 0, 0).expect("08:00 is a valid time"),
        }
    }
}
