//! Background jobs.

mod notification_job;

pub use notification_job::{JobStatus, NotificationJob, PassReport, PassSummary, SkipReason};
