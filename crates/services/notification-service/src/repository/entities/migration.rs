//! Migration database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::Migration;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "migrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub species: String,
    pub image_url: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::migration_step::Entity")]
    Steps,
}

impl Related<super::migration_step::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Steps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Migration {
    fn from(model: Model) -> Self {
        Migration {
            id: model.id,
            title: model.title,
            description: model.description,
            species: model.species,
            image_url: model.image_url,
            user_id: model.user_id,
        }
    }
}
