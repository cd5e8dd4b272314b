//! Writes to the coordinates table.

use super::error::Error;
use entity::coordinate_owner::CoordinateOwner;
use entity::coordinates::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, Condition, ConnectionTrait, TryIntoModel};

/// A point to be stored, optionally with a street address.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// Inserts a coordinate row for the given owner.
pub async fn insert(
    db: &impl ConnectionTrait,
    owner: CoordinateOwner,
    entity_id: Id,
    point: Point,
    is_current: bool,
) -> Result<Model, Error> {
    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        entity_id: Set(entity_id),
        entity_type: Set(owner),
        address: Set(point.address),
        latitude: Set(point.latitude),
        longitude: Set(point.longitude),
        is_current: Set(is_current),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Ok(active_model.insert(db).await?.try_into_model()?)
}

/// Demotes the owner's current coordinate (if any) and stores `point` as the
/// new current one. Callers run this inside a transaction.
pub async fn replace_current(
    db: &impl ConnectionTrait,
    owner: CoordinateOwner,
    entity_id: Id,
    point: Point,
) -> Result<Model, Error> {
    let demoted = Entity::update_many()
        .set(ActiveModel {
            is_current: Set(false),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        })
        .filter(
            Condition::all()
                .add(Column::EntityId.eq(entity_id))
                .add(Column::EntityType.eq(owner))
                .add(Column::IsCurrent.eq(true)),
        )
        .exec(db)
        .await?;

    trace!(
        "Demoted {} current coordinate(s) for {entity_id}",
        demoted.rows_affected
    );

    insert(db, owner, entity_id, point, true).await
}
