//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::{User, UserRole};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub role: String,
    /// Home location (NULL = none picked yet)
    pub location_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::place::Entity",
        from = "Column::LocationId",
        to = "super::place::Column::Id",
        on_delete = "SetNull"
    )]
    Location,
}

impl Related<super::place::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            email: model.email,
            role: UserRole::from(model.role.as_str()),
            location_id: model.location_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
