//! SeaORM entities for the migration tracker schema.

pub mod migration;
pub mod migration_step;
pub mod place;
pub mod user;
