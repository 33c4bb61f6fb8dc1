//! Migration step database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::{DomainResult, MigrationStep};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "migration_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub migration_id: Uuid,
    pub place_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::migration::Entity",
        from = "Column::MigrationId",
        to = "super::migration::Column::Id",
        on_delete = "Cascade"
    )]
    Migration,
    #[sea_orm(
        belongs_to = "super::place::Entity",
        from = "Column::PlaceId",
        to = "super::place::Column::Id",
        on_delete = "Cascade"
    )]
    Place,
}

impl Related<super::migration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Migration.def()
    }
}

impl Related<super::place::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Place.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Convert to the domain step, re-checking the date range invariant.
    pub fn into_domain(self) -> DomainResult<MigrationStep> {
        MigrationStep::new(
            self.id,
            self.migration_id,
            self.place_id,
            self.start_date,
            self.end_date,
        )
    }
}
