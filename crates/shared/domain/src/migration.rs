//! Migration and migration step entities.
//!
//! Step dates are stored exactly as entered. Migrations recur every year,
//! so "does this step start today" is answered with [`MonthDay`], which
//! drops the year at comparison time instead of normalizing it on write.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// A named, species-tagged journey created by a biologist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub species: String,
    pub image_url: Option<String>,
    /// Creator of the migration
    pub user_id: Uuid,
}

/// One leg of a migration: a place plus a start/end date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStep {
    pub id: Uuid,
    pub migration_id: Uuid,
    pub place_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl MigrationStep {
    /// Build a step, rejecting ranges that end before they start.
    pub fn new(
        id: Uuid,
        migration_id: Uuid,
        place_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DomainResult<Self> {
        if start_date > end_date {
            return Err(DomainError::validation(format!(
                "Migration step cannot end ({}) before it starts ({})",
                end_date, start_date
            )));
        }

        Ok(Self {
            id,
            migration_id,
            place_id,
            start_date,
            end_date,
        })
    }
}

/// Calendar day without a year.
///
/// February 29 only equals February 29; in non-leap years such a step has
/// no matching day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Drop the year of a date.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    /// Whether the date falls on this month and day, in any year.
    pub fn matches(&self, date: NaiveDate) -> bool {
        *self == MonthDay::of(date)
    }
}

impl std::fmt::Display for MonthDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}
