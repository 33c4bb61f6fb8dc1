//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! users and their home locations, migrations and their dated steps, and the
//! digest composition used by the notification job.

pub mod constants;
pub mod error;
pub mod migration;
pub mod notification;
pub mod place;
pub mod user;

pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use migration::{Migration, MigrationStep, MonthDay};
pub use notification::{Digest, HomeLocation, LocatedStep, MigrationSummary, NotificationCandidate};
pub use place::Place;
pub use user::{User, UserRole};
