//! User directory: the one read the notification job needs.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use super::entities::{migration, migration_step, place, user};
use common::{AppError, AppResult};
use domain::{HomeLocation, LocatedStep, Migration, NotificationCandidate, Place, User};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User directory trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Every user with their home location (if any) and every migration
    /// step through that location, joined to its migration.
    async fn list_users_with_home_location_and_steps(&self) -> AppResult<Vec<NotificationCandidate>>;
}

/// SeaORM-backed user directory
pub struct UserDirectoryStore {
    db: DatabaseConnection,
}

impl UserDirectoryStore {
    /// Create new directory instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load_places(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Place>> {
        let models = place::Entity::find()
            .filter(place::Column::Id.is_in(ids.to_vec()))
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models
            .into_iter()
            .map(|model| (model.id, Place::from(model)))
            .collect())
    }

    async fn load_steps_by_place(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<LocatedStep>>> {
        let rows = migration_step::Entity::find()
            .filter(migration_step::Column::PlaceId.is_in(ids.to_vec()))
            .find_also_related(migration::Entity)
            .order_by_asc(migration_step::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(group_steps_by_place(rows))
    }
}

/// Distinct home place ids, in order of first occurrence.
fn home_place_ids(users: &[User]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    users
        .iter()
        .filter_map(|user| user.location_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Join each step to its migration and group by place, dropping rows
/// without a migration or with an inverted date range.
fn group_steps_by_place(
    rows: Vec<(migration_step::Model, Option<migration::Model>)>,
) -> HashMap<Uuid, Vec<LocatedStep>> {
    let mut steps_by_place: HashMap<Uuid, Vec<LocatedStep>> = HashMap::new();
    for (step_model, migration_model) in rows {
        let Some(migration_model) = migration_model else {
            tracing::warn!(step_id = %step_model.id, "Migration step without migration, skipping");
            continue;
        };

        let step = match step_model.into_domain() {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!("Skipping invalid migration step: {}", e);
                continue;
            }
        };

        let migration = Migration::from(migration_model);
        steps_by_place
            .entry(step.place_id)
            .or_default()
            .push(LocatedStep::new(&step, &migration));
    }
    steps_by_place
}

/// A user whose place no longer exists has no home location.
fn assemble_candidates(
    users: &[User],
    places: &HashMap<Uuid, Place>,
    steps_by_place: &HashMap<Uuid, Vec<LocatedStep>>,
) -> Vec<NotificationCandidate> {
    users
        .iter()
        .map(|user| {
            let location = user
                .location_id
                .and_then(|id| places.get(&id))
                .map(|place| HomeLocation {
                    place_id: place.id,
                    title: place.title.clone(),
                    steps: steps_by_place.get(&place.id).cloned().unwrap_or_default(),
                });
            NotificationCandidate::new(user, location)
        })
        .collect()
}

#[async_trait]
impl UserDirectory for UserDirectoryStore {
    async fn list_users_with_home_location_and_steps(&self) -> AppResult<Vec<NotificationCandidate>> {
        let users: Vec<User> = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(AppError::from)?
            .into_iter()
            .map(User::from)
            .collect();

        let place_ids = home_place_ids(&users);
        if place_ids.is_empty() {
            return Ok(assemble_candidates(&users, &HashMap::new(), &HashMap::new()));
        }

        let places = self.load_places(&place_ids).await?;
        let steps_by_place = self.load_steps_by_place(&place_ids).await?;

        Ok(assemble_candidates(&users, &places, &steps_by_place))
    }
}
