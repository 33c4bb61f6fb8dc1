//! Notification read model and digest composition.
//!
//! The notification job receives one [`NotificationCandidate`] per user,
//! already joined with the user's home location and every migration step
//! passing through it. Composition is pure so it can be tested without a
//! database or a mail transport.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DIGEST_LEAD_IN, DIGEST_LINK_SEPARATOR, DIGEST_SPECIES_SEPARATOR, MIGRATION_DETAIL_PATH,
};
use crate::migration::{Migration, MigrationStep, MonthDay};
use crate::user::User;

/// Parent migration of a step, reduced to what a digest needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub id: Uuid,
    pub title: String,
    pub species: String,
}

impl From<&Migration> for MigrationSummary {
    fn from(migration: &Migration) -> Self {
        Self {
            id: migration.id,
            title: migration.title.clone(),
            species: migration.species.clone(),
        }
    }
}

/// A migration step through a home location, joined to its migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedStep {
    pub step_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub migration: MigrationSummary,
}

impl LocatedStep {
    pub fn new(step: &MigrationStep, migration: &Migration) -> Self {
        Self {
            step_id: step.id,
            start_date: step.start_date,
            end_date: step.end_date,
            migration: MigrationSummary::from(migration),
        }
    }

    /// Whether the step starts on `today`, ignoring the year.
    pub fn starts_on(&self, today: NaiveDate) -> bool {
        MonthDay::of(self.start_date).matches(today)
    }
}

/// A user's home location with the steps passing through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub place_id: Uuid,
    pub title: String,
    pub steps: Vec<LocatedStep>,
}

impl HomeLocation {
    /// Steps starting on `today`, in stored order.
    pub fn starting_steps(&self, today: NaiveDate) -> Vec<&LocatedStep> {
        self.steps.iter().filter(|step| step.starts_on(today)).collect()
    }
}

/// One user as seen by the notification job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCandidate {
    pub user_id: Uuid,
    pub email: String,
    pub location: Option<HomeLocation>,
}

impl NotificationCandidate {
    pub fn new(user: &User, location: Option<HomeLocation>) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            location,
        }
    }
}

/// A composed digest email, ready for the mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

impl Digest {
    /// Compose the digest for the steps starting today at a home location.
    ///
    /// Returns `None` when there are no steps. The subject lists distinct
    /// species in order of first occurrence; its verb is singular only when
    /// exactly one step matched, regardless of how many species remain after
    /// de-duplication.
    pub fn compose(
        recipient: &str,
        location_title: &str,
        steps: &[&LocatedStep],
        base_url: &str,
    ) -> Option<Self> {
        if steps.is_empty() {
            return None;
        }

        let species = distinct_species(steps).join(DIGEST_SPECIES_SEPARATOR);
        let verb = if steps.len() == 1 { "is" } else { "are" };
        let subject = format!(
            "{} {} beginning to migrate to {}",
            species, verb, location_title
        );

        let base_url = base_url.trim_end_matches('/');
        let links = steps
            .iter()
            .map(|step| migration_link(base_url, &step.migration))
            .collect::<Vec<_>>()
            .join(DIGEST_LINK_SEPARATOR);

        Some(Self {
            recipient: recipient.to_string(),
            subject,
            html_body: format!("{}{}", DIGEST_LEAD_IN, links),
        })
    }
}

fn distinct_species<'a>(steps: &[&'a LocatedStep]) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::with_capacity(steps.len());
    for &step in steps {
        let species = step.migration.species.as_str();
        if !seen.contains(&species) {
            seen.push(species);
        }
    }
    seen
}

fn migration_link(base_url: &str, migration: &MigrationSummary) -> String {
    format!(
        r#"<a href="{}{}{}">{} ({})</a>"#,
        base_url,
        MIGRATION_DETAIL_PATH,
        migration.id,
        escape_html(&migration.title),
        escape_html(&migration.species)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
