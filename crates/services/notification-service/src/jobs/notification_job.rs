//! Notification dispatch job.
//!
//! One pass finds the users whose home location has migration steps
//! starting today (month and day, any year) and sends each of them a
//! single digest email. Passes are gated by a cooldown so that overlapping
//! triggers or rapid restarts cannot send the same digest twice.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use common::AppResult;
use domain::{Digest, MonthDay, NotificationCandidate};

use crate::config::{FailedSendPolicy, NotificationSettings};
use crate::mailer::Mailer;
use crate::repository::UserDirectory;

/// Why a pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The previous pass started less than the cooldown ago
    Cooldown,
    /// Another pass holds the gate
    PassInProgress,
}

/// Counters of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub users_considered: usize,
    pub skipped_without_location: usize,
    pub skipped_without_starting_steps: usize,
    pub sent: usize,
    pub failed: usize,
    /// Digests carried over from an earlier failed pass
    pub retried: usize,
}

/// Outcome of one invocation of [`NotificationJob::run_pass`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassReport {
    Skipped { reason: SkipReason },
    Completed(PassSummary),
}

/// Snapshot of the gate state, readable while a pass runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub last_run_at: DateTime<Utc>,
    pub pending_retries: usize,
}

#[derive(Debug)]
struct OutgoingDigest {
    digest: Digest,
    /// Send attempts made so far
    attempts: u32,
}

#[derive(Debug)]
struct JobState {
    last_run_at: DateTime<Utc>,
    pending_retries: Vec<OutgoingDigest>,
}

/// Sends daily digests of starting migrations.
pub struct NotificationJob {
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    settings: NotificationSettings,
    /// Pass gate, held for a whole pass
    state: Mutex<JobState>,
    /// Published at the gate and at the end of every pass
    status: watch::Sender<JobStatus>,
}

impl NotificationJob {
    /// Create the job. `last_run_at` seeds the cooldown gate; pass the
    /// process start time to suppress a pass right after a restart.
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        settings: NotificationSettings,
        last_run_at: DateTime<Utc>,
    ) -> Self {
        let (status, _) = watch::channel(JobStatus {
            last_run_at,
            pending_retries: 0,
        });

        Self {
            directory,
            mailer,
            settings,
            state: Mutex::new(JobState {
                last_run_at,
                pending_retries: Vec::new(),
            }),
            status,
        }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Current gate state. Never waits for a running pass.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Run one notification pass as of `now`.
    ///
    /// Only configuration and directory failures are returned as errors.
    /// Failed sends are counted in the summary and never stop the pass.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> AppResult<PassReport> {
        let Ok(mut state) = self.state.try_lock() else {
            tracing::warn!("Notification pass already running, skipping");
            return Ok(PassReport::Skipped {
                reason: SkipReason::PassInProgress,
            });
        };

        let elapsed = (now - state.last_run_at).abs();
        if elapsed < self.settings.cooldown {
            tracing::warn!(
                elapsed_seconds = elapsed.num_seconds(),
                cooldown_seconds = self.settings.cooldown.num_seconds(),
                "Too early, not sending notifications yet"
            );
            return Ok(PassReport::Skipped {
                reason: SkipReason::Cooldown,
            });
        }
        state.last_run_at = now;
        self.status.send_modify(|status| status.last_run_at = now);

        let sender = self.settings.sender()?;
        let today = now.with_timezone(&self.settings.utc_offset).date_naive();
        tracing::info!(%now, day = %MonthDay::of(today), "Sending out notifications");

        let candidates = self
            .directory
            .list_users_with_home_location_and_steps()
            .await?;

        let mut summary = PassSummary {
            users_considered: candidates.len(),
            ..PassSummary::default()
        };

        let mut outgoing: Vec<OutgoingDigest> = Vec::new();
        for candidate in &candidates {
            match compose_for(candidate, today, &sender.base_url) {
                Selection::NoLocation => {
                    tracing::info!(user = %candidate.email, "No location for user");
                    summary.skipped_without_location += 1;
                }
                Selection::NoStartingSteps(location) => {
                    tracing::info!(location = %location, "No starting migrations found");
                    summary.skipped_without_starting_steps += 1;
                }
                Selection::Ready(digest) => outgoing.push(OutgoingDigest {
                    digest,
                    attempts: 0,
                }),
            }
        }

        for pending in std::mem::take(&mut state.pending_retries) {
            if outgoing
                .iter()
                .any(|o| o.digest.recipient == pending.digest.recipient)
            {
                tracing::debug!(to = %pending.digest.recipient, "Retry superseded by a fresh digest");
                continue;
            }
            summary.retried += 1;
            outgoing.push(pending);
        }

        let from = sender.address.as_str();
        let mailer = &self.mailer;
        let results: Vec<_> = stream::iter(outgoing)
            .map(|item| async move {
                let result = mailer
                    .send_email(
                        from,
                        &item.digest.recipient,
                        &item.digest.subject,
                        &item.digest.html_body,
                    )
                    .await;
                (item, result)
            })
            .buffer_unordered(self.settings.send_concurrency.max(1))
            .collect()
            .await;

        for (mut item, result) in results {
            item.attempts += 1;
            match result {
                Ok(info) => {
                    summary.sent += 1;
                    tracing::info!(
                        to = %item.digest.recipient,
                        code = %info.code,
                        "Notification email sent: {}",
                        info.response
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        to = %item.digest.recipient,
                        attempts = item.attempts,
                        "Failed to send notification email: {}",
                        e
                    );
                    if let FailedSendPolicy::RetryNextPass { max_attempts } =
                        self.settings.failed_send_policy
                    {
                        if item.attempts < max_attempts {
                            state.pending_retries.push(item);
                        } else {
                            tracing::warn!(to = %item.digest.recipient, "Giving up on notification email");
                        }
                    }
                }
            }
        }

        let pending_retries = state.pending_retries.len();
        self.status
            .send_modify(|status| status.pending_retries = pending_retries);

        tracing::info!(
            users = summary.users_considered,
            sent = summary.sent,
            failed = summary.failed,
            retried = summary.retried,
            "Notification pass finished"
        );

        Ok(PassReport::Completed(summary))
    }
}

enum Selection<'a> {
    NoLocation,
    NoStartingSteps(&'a str),
    Ready(Digest),
}

fn compose_for<'a>(
    candidate: &'a NotificationCandidate,
    today: NaiveDate,
    base_url: &str,
) -> Selection<'a> {
    let Some(location) = &candidate.location else {
        return Selection::NoLocation;
    };

    let starting = location.starting_steps(today);
    match Digest::compose(&candidate.email, &location.title, &starting, base_url) {
        Some(digest) => Selection::Ready(digest),
        None => Selection::NoStartingSteps(&location.title),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::{Duration, FixedOffset, TimeZone};
    use tokio::sync::Notify;
    use uuid::Uuid;

    use common::AppError;
    use domain::{HomeLocation, LocatedStep, MigrationSummary};

    use super::*;
    use crate::mailer::{DeliveryInfo, MockMailer, SendError};
    use crate::repository::MockUserDirectory;

    fn settings() -> NotificationSettings {
        NotificationSettings {
            sender_address: Some("birds@example.com".to_string()),
            sender_password: Some("secret".to_string()),
            base_url: Some("https://birds.example.com".to_string()),
            ..NotificationSettings::default()
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn step(species: &str, y: i32, m: u32, d: u32) -> LocatedStep {
        let start = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        LocatedStep {
            step_id: Uuid::new_v4(),
            start_date: start,
            end_date: start + Duration::days(10),
            migration: MigrationSummary {
                id: Uuid::new_v4(),
                title: format!("{} migration", species),
                species: species.to_string(),
            },
        }
    }

    fn candidate(email: &str, location: Option<(&str, Vec<LocatedStep>)>) -> NotificationCandidate {
        NotificationCandidate {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            location: location.map(|(title, steps)| HomeLocation {
                place_id: Uuid::new_v4(),
                title: title.to_string(),
                steps,
            }),
        }
    }

    fn delivered() -> DeliveryInfo {
        DeliveryInfo {
            code: "250".to_string(),
            response: "OK".to_string(),
        }
    }

    fn directory_returning(candidates: Vec<NotificationCandidate>, times: usize) -> MockUserDirectory {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_users_with_home_location_and_steps()
            .times(times)
            .returning(move || Ok(candidates.clone()));
        directory
    }

    /// Mailer that records (to, subject) and fails for the given recipients.
    fn recording_mailer(
        failing: &'static [&'static str],
        sent: Arc<StdMutex<Vec<(String, String)>>>,
    ) -> MockMailer {
        let mut mailer = MockMailer::new();
        mailer.expect_send_email().returning(move |_, to, subject, _| {
            sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            if failing.iter().any(|f| *f == to) {
                Err(SendError::Transport("connection reset".to_string()))
            } else {
                Ok(delivered())
            }
        });
        mailer
    }

    fn job(
        directory: MockUserDirectory,
        mailer: MockMailer,
        settings: NotificationSettings,
        last_run_at: DateTime<Utc>,
    ) -> NotificationJob {
        NotificationJob::new(Arc::new(directory), Arc::new(mailer), settings, last_run_at)
    }

    #[tokio::test]
    async fn pass_inside_cooldown_loads_nothing() {
        let now = at(2026, 4, 1, 8);
        let mut mailer = MockMailer::new();
        mailer.expect_send_email().times(0);

        let job = job(directory_returning(vec![], 0), mailer, settings(), now - Duration::minutes(4));

        let report = job.run_pass(now).await.unwrap();

        assert_eq!(report, PassReport::Skipped { reason: SkipReason::Cooldown });
        assert_eq!(job.status().last_run_at, now - Duration::minutes(4));
    }

    #[tokio::test]
    async fn pass_after_cooldown_loads_once_and_advances_gate() {
        let now = at(2026, 4, 1, 8);
        let job = job(
            directory_returning(vec![], 1),
            MockMailer::new(),
            settings(),
            now - Duration::minutes(5),
        );

        let report = tokio_test::assert_ok!(job.run_pass(now).await);

        assert!(matches!(report, PassReport::Completed(_)));
        assert_eq!(job.status().last_run_at, now);
    }

    #[tokio::test]
    async fn immediate_second_pass_is_coalesced() {
        let now = at(2026, 4, 1, 8);
        let job = job(
            directory_returning(vec![], 1),
            MockMailer::new(),
            settings(),
            now - Duration::hours(1),
        );

        job.run_pass(now).await.unwrap();
        let second = job.run_pass(now + Duration::minutes(1)).await.unwrap();

        assert_eq!(second, PassReport::Skipped { reason: SkipReason::Cooldown });
        assert_eq!(job.status().last_run_at, now);
    }

    #[tokio::test]
    async fn pass_while_gate_is_held_is_skipped() {
        let now = at(2026, 4, 1, 8);
        let job = job(
            directory_returning(vec![], 0),
            MockMailer::new(),
            settings(),
            now - Duration::hours(1),
        );

        let _held = job.state.lock().await;
        let report = job.run_pass(now).await.unwrap();

        assert_eq!(report, PassReport::Skipped { reason: SkipReason::PassInProgress });
    }

    #[tokio::test]
    async fn status_is_readable_while_gate_is_held() {
        let now = at(2026, 4, 1, 8);
        let job = job(directory_returning(vec![], 0), MockMailer::new(), settings(), now);

        let _held = job.state.lock().await;

        assert_eq!(
            job.status(),
            JobStatus {
                last_run_at: now,
                pending_retries: 0,
            }
        );
    }

    /// Mailer that parks every send until released.
    struct ParkedMailer {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Mailer for ParkedMailer {
        async fn send_email(
            &self,
            _from: &str,
            _to: &str,
            _subject: &str,
            _html_body: &str,
        ) -> Result<DeliveryInfo, SendError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(delivered())
        }
    }

    #[tokio::test]
    async fn status_answers_while_a_pass_is_sending() {
        let now = at(2026, 4, 1, 8);
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let candidates = vec![candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, 1)])))];
        let job = Arc::new(NotificationJob::new(
            Arc::new(directory_returning(candidates, 1)),
            Arc::new(ParkedMailer {
                started: started.clone(),
                release: release.clone(),
            }),
            settings(),
            now - Duration::hours(1),
        ));

        let pass = tokio::spawn({
            let job = Arc::clone(&job);
            async move { job.run_pass(now).await }
        });
        started.notified().await;

        assert_eq!(job.status().last_run_at, now);
        let overlapping = job.run_pass(now + Duration::hours(1)).await.unwrap();
        assert_eq!(overlapping, PassReport::Skipped { reason: SkipReason::PassInProgress });

        release.notify_one();
        let report = pass.await.unwrap().unwrap();
        assert!(matches!(report, PassReport::Completed(ref s) if s.sent == 1));
    }

    #[tokio::test]
    async fn missing_configuration_fails_before_loading_users() {
        let now = at(2026, 4, 1, 8);
        let settings = NotificationSettings {
            sender_password: None,
            ..settings()
        };
        let job = job(directory_returning(vec![], 0), MockMailer::new(), settings, now - Duration::hours(1));

        let err = job.run_pass(now).await.unwrap_err();

        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn directory_failure_is_fatal() {
        let now = at(2026, 4, 1, 8);
        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_users_with_home_location_and_steps()
            .times(1)
            .returning(|| Err(AppError::internal("connection pool exhausted")));
        let job = job(directory, MockMailer::new(), settings(), now - Duration::hours(1));

        assert!(job.run_pass(now).await.is_err());
    }

    #[tokio::test]
    async fn matches_start_dates_from_any_year() {
        let now = at(2026, 4, 1, 8);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let candidates = vec![candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2000, 4, 1)])))];
        let job = job(
            directory_returning(candidates, 1),
            recording_mailer(&[], sent.clone()),
            settings(),
            now - Duration::hours(1),
        );

        job.run_pass(now).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Stork is beginning to migrate to Berlin");
    }

    #[tokio::test]
    async fn users_without_location_or_starting_steps_get_nothing() {
        let now = at(2026, 4, 1, 8);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let candidates = vec![
            candidate("homeless@example.com", None),
            candidate("quiet@example.com", Some(("Oslo", vec![step("Crane", 2026, 4, 2)]))),
            candidate("empty@example.com", Some(("Rome", vec![]))),
        ];
        let job = job(
            directory_returning(candidates, 1),
            recording_mailer(&[], sent.clone()),
            settings(),
            now - Duration::hours(1),
        );

        let report = job.run_pass(now).await.unwrap();

        assert!(sent.lock().unwrap().is_empty());
        let PassReport::Completed(summary) = report else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.users_considered, 3);
        assert_eq!(summary.skipped_without_location, 1);
        assert_eq!(summary.skipped_without_starting_steps, 2);
        assert_eq!(summary.sent, 0);
    }

    #[tokio::test]
    async fn digest_lists_distinct_species_with_plural_verb() {
        let now = at(2026, 4, 1, 8);
        let mut mailer = MockMailer::new();
        mailer
            .expect_send_email()
            .times(1)
            .withf(|from, to, subject, body| {
                from.contains("birds@example.com")
                    && to.contains("a@example.com")
                    && subject.contains("Stork, Heron are beginning to migrate to Berlin")
                    && body.matches("<a href=\"https://birds.example.com/migrations/").count() == 3
            })
            .returning(|_, _, _, _| Ok(delivered()));

        let candidates = vec![candidate(
            "a@example.com",
            Some((
                "Berlin",
                vec![
                    step("Stork", 2026, 4, 1),
                    step("Stork", 2026, 4, 1),
                    step("Heron", 2026, 4, 1),
                    step("Crane", 2026, 4, 9),
                ],
            )),
        )];
        let job = job(directory_returning(candidates, 1), mailer, settings(), now - Duration::hours(1));

        job.run_pass(now).await.unwrap();
    }

    #[tokio::test]
    async fn send_failure_does_not_stop_other_users() {
        let now = at(2026, 4, 1, 8);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let candidates = vec![
            candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, 1)]))),
            candidate("b@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, 1)]))),
        ];
        let job = job(
            directory_returning(candidates, 1),
            recording_mailer(&["a@example.com"], sent.clone()),
            settings(),
            now - Duration::hours(1),
        );

        let report = job.run_pass(now).await.unwrap();

        let recipients: Vec<String> = sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect();
        assert!(recipients.contains(&"a@example.com".to_string()));
        assert!(recipients.contains(&"b@example.com".to_string()));
        let PassReport::Completed(summary) = report else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(job.status().pending_retries, 0);
    }

    #[tokio::test]
    async fn today_follows_configured_offset() {
        // 23:30 UTC on March 31 is already April 1 at UTC+1
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 30, 0).unwrap();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let candidates = vec![candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, 1)])))];
        let settings = NotificationSettings {
            utc_offset: FixedOffset::east_opt(3600).unwrap(),
            ..settings()
        };
        let job = job(
            directory_returning(candidates, 1),
            recording_mailer(&[], sent.clone()),
            settings,
            now - Duration::hours(1),
        );

        job.run_pass(now).await.unwrap();

        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_policy_resends_failed_digest_on_next_pass() {
        let first = at(2026, 4, 1, 8);
        let second = first + Duration::hours(1);
        let attempts = Arc::new(StdMutex::new(0u32));

        let mut directory = MockUserDirectory::new();
        let mut calls = 0;
        directory
            .expect_list_users_with_home_location_and_steps()
            .times(2)
            .returning(move || {
                calls += 1;
                // Only the first pass sees a starting step
                let day = if calls == 1 { 1 } else { 20 };
                Ok(vec![candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, day)])))])
            });

        let mut mailer = MockMailer::new();
        let counter = attempts.clone();
        mailer.expect_send_email().times(2).returning(move |_, _, _, _| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            if *n == 1 {
                Err(SendError::Transport("timeout".to_string()))
            } else {
                Ok(delivered())
            }
        });

        let settings = NotificationSettings {
            failed_send_policy: FailedSendPolicy::RetryNextPass { max_attempts: 3 },
            ..settings()
        };
        let job = job(directory, mailer, settings, first - Duration::hours(1));

        job.run_pass(first).await.unwrap();
        assert_eq!(job.status().pending_retries, 1);

        let report = job.run_pass(second).await.unwrap();

        let PassReport::Completed(summary) = report else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.retried, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped_without_starting_steps, 1);
        assert_eq!(job.status().pending_retries, 0);
    }

    #[tokio::test]
    async fn retry_policy_gives_up_after_max_attempts() {
        let first = at(2026, 4, 1, 8);
        let sent = Arc::new(StdMutex::new(Vec::new()));

        let mut directory = MockUserDirectory::new();
        let mut calls = 0;
        directory
            .expect_list_users_with_home_location_and_steps()
            .times(3)
            .returning(move || {
                calls += 1;
                let day = if calls == 1 { 1 } else { 20 };
                Ok(vec![candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, day)])))])
            });

        let settings = NotificationSettings {
            failed_send_policy: FailedSendPolicy::RetryNextPass { max_attempts: 2 },
            ..settings()
        };
        let job = job(
            directory,
            recording_mailer(&["a@example.com"], sent.clone()),
            settings,
            first - Duration::hours(1),
        );

        job.run_pass(first).await.unwrap();
        job.run_pass(first + Duration::hours(1)).await.unwrap();
        assert_eq!(job.status().pending_retries, 0);

        job.run_pass(first + Duration::hours(2)).await.unwrap();
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fresh_digest_supersedes_pending_retry() {
        let first = at(2026, 4, 1, 8);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let candidates = vec![candidate("a@example.com", Some(("Berlin", vec![step("Stork", 2026, 4, 1)])))];

        let settings = NotificationSettings {
            failed_send_policy: FailedSendPolicy::RetryNextPass { max_attempts: 5 },
            ..settings()
        };
        let job = job(
            directory_returning(candidates, 2),
            recording_mailer(&["a@example.com"], sent.clone()),
            settings,
            first - Duration::hours(1),
        );

        job.run_pass(first).await.unwrap();
        let report = job.run_pass(first + Duration::minutes(10)).await.unwrap();

        let PassReport::Completed(summary) = report else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.retried, 0);
        assert_eq!(sent.lock().unwrap().len(), 2);
    }
}
