//! SeaORM Entity for the driver_sessions table. A session spans one
//! online period; `ended_at` is null while the driver is online.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::driver_sessions::Model)]
#[sea_orm(schema_name = "ride_hail", table_name = "driver_sessions")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    #[schema(value_type = Uuid)]
    pub driver_id: Id,

    #[schema(value_type = String, format = DateTime)]
    pub started_at: DateTimeWithTimeZone,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub ended_at: Option<DateTimeWithTimeZone>,

    pub total_rides: i32,

    pub total_earnings: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::drivers::Entity",
        from = "Column::DriverId",
        to = "super::drivers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Drivers,
}

impl Related<super::drivers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drivers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
