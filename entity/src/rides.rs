//! SeaORM Entity for the rides table.

use crate::ride_status::RideStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::rides::Model)]
#[sea_orm(schema_name = "ride_hail", table_name = "rides")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    /// Human readable `RIDE_<YYYYMMDD>_<NNN>`
    #[sea_orm(unique)]
    pub ride_number: String,

    #[schema(value_type = Uuid)]
    pub passenger_id: Id,

    /// Set once a driver has been matched
    #[schema(value_type = Option<Uuid>)]
    pub driver_id: Option<Id>,

    /// One of the configured ride types, e.g. ECONOMY
    pub vehicle_type: String,

    pub status: RideStatus,

    pub priority: i32,

    #[schema(value_type = String, format = DateTime)]
    pub requested_at: DateTimeWithTimeZone,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub matched_at: Option<DateTimeWithTimeZone>,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub started_at: Option<DateTimeWithTimeZone>,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<DateTimeWithTimeZone>,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub cancelled_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text")]
    pub cancellation_reason: Option<String>,

    pub estimated_fare: Option<f64>,

    pub final_fare: Option<f64>,

    #[schema(value_type = Uuid)]
    pub pickup_coordinate_id: Id,

    #[schema(value_type = Uuid)]
    pub destination_coordinate_id: Id,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::drivers::Entity",
        from = "Column::DriverId",
        to = "super::drivers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Drivers,

    #[sea_orm(
        belongs_to = "super::coordinates::Entity",
        from = "Column::PickupCoordinateId",
        to = "super::coordinates::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    PickupCoordinate,

    #[sea_orm(
        belongs_to = "super::coordinates::Entity",
        from = "Column::DestinationCoordinateId",
        to = "super::coordinates::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    DestinationCoordinate,
}

impl Related<super::drivers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drivers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
