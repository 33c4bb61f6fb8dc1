//! Migration: Create observations table.

use sea_orm_migration::prelude::*;

use super::{Migrations, Places, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Observations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Observations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Observations::Title).string().not_null())
                    .col(ColumnDef::new(Observations::Description).text().not_null())
                    .col(ColumnDef::new(Observations::ImageUrl).string().null())
                    .col(ColumnDef::new(Observations::UserId).uuid().not_null())
                    .col(ColumnDef::new(Observations::MigrationId).uuid().not_null())
                    .col(ColumnDef::new(Observations::PlaceId).uuid().not_null())
                    .col(
                        ColumnDef::new(Observations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Observations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_observations_user_id")
                            .from(Observations::Table, Observations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_observations_migration_id")
                            .from(Observations::Table, Observations::MigrationId)
                            .to(Migrations::Table, Migrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_observations_place_id")
                            .from(Observations::Table, Observations::PlaceId)
                            .to(Places::Table, Places::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Observations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Observations {
    Table,
    Id,
    Title,
    Description,
    ImageUrl,
    UserId,
    MigrationId,
    PlaceId,
    CreatedAt,
    UpdatedAt,
}
