//! Place database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::Place;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "places")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::migration_step::Entity")]
    MigrationSteps,
    #[sea_orm(has_many = "super::user::Entity")]
    Residents,
}

impl Related<super::migration_step::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MigrationSteps.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Residents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Place {
    fn from(model: Model) -> Self {
        Place {
            id: model.id,
            title: model.title,
            latitude: model.latitude,
            longitude: model.longitude,
        }
    }
}
