//! SeaORM Entity for the coordinates table. A row is either a point attached
//! to a ride (pickup, destination) or an actor's last known position.

use crate::coordinate_owner::CoordinateOwner;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::coordinates::Model)]
#[sea_orm(schema_name = "ride_hail", table_name = "coordinates")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    /// Passenger or driver id, depending on `entity_type`
    #[schema(value_type = Uuid)]
    pub entity_id: Id,

    #[schema(value_type = String)]
    pub entity_type: CoordinateOwner,

    #[sea_orm(column_type = "Text")]
    pub address: Option<String>,

    pub latitude: f64,

    pub longitude: f64,

    /// Only one current row per actor
    pub is_current: bool,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
