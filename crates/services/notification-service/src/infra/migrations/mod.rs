//! Database migrations.
//!
//! Each migration is a separate module following SeaORM conventions.
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_migration_tables;
mod m20240102_000001_create_observations_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_migration_tables::Migration),
            Box::new(m20240102_000001_create_observations_table::Migration),
        ]
    }
}

#[derive(Iden)]
pub(crate) enum Places {
    Table,
    Id,
    Title,
    Latitude,
    Longitude,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    Role,
    LocationId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(crate) enum Migrations {
    Table,
    Id,
    Title,
    Description,
    Species,
    ImageUrl,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(crate) enum MigrationSteps {
    Table,
    Id,
    MigrationId,
    PlaceId,
    StartDate,
    EndDate,
    CreatedAt,
}
