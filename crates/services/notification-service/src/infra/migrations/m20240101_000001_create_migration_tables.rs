//! Migration: Create places, users, migrations and migration steps.

use sea_orm_migration::prelude::*;

use super::{MigrationSteps, Migrations, Places, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Places::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Places::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Places::Title).string().not_null().unique_key())
                    .col(ColumnDef::new(Places::Latitude).double().not_null())
                    .col(ColumnDef::new(Places::Longitude).double().not_null())
                    .col(
                        ColumnDef::new(Places::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Role).string().not_null().default("CITIZEN"))
                    .col(ColumnDef::new(Users::LocationId).uuid().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_location_id")
                            .from(Users::Table, Users::LocationId)
                            .to(Places::Table, Places::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Migrations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Migrations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Migrations::Title).string().not_null())
                    .col(ColumnDef::new(Migrations::Description).text().not_null())
                    .col(ColumnDef::new(Migrations::Species).string().not_null())
                    .col(ColumnDef::new(Migrations::ImageUrl).string().null())
                    .col(ColumnDef::new(Migrations::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Migrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Migrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_migrations_user_id")
                            .from(Migrations::Table, Migrations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MigrationSteps::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MigrationSteps::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(MigrationSteps::MigrationId).uuid().not_null())
                    .col(ColumnDef::new(MigrationSteps::PlaceId).uuid().not_null())
                    .col(ColumnDef::new(MigrationSteps::StartDate).date().not_null())
                    .col(ColumnDef::new(MigrationSteps::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(MigrationSteps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(
                        Expr::col(MigrationSteps::StartDate).lte(Expr::col(MigrationSteps::EndDate)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_migration_steps_migration_id")
                            .from(MigrationSteps::Table, MigrationSteps::MigrationId)
                            .to(Migrations::Table, Migrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_migration_steps_place_id")
                            .from(MigrationSteps::Table, MigrationSteps::PlaceId)
                            .to(Places::Table, Places::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The notification pass loads steps by place
        manager
            .create_index(
                Index::create()
                    .name("idx_migration_steps_place_id")
                    .table(MigrationSteps::Table)
                    .col(MigrationSteps::PlaceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MigrationSteps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Migrations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Places::Table).to_owned())
            .await
    }
}
