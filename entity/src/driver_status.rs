use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "driver_status")]
pub enum DriverStatus {
    #[sea_orm(string_value = "OFFLINE")]
    #[default]
    Offline,
    #[sea_orm(string_value = "AVAILABLE")]
    Available,
    #[sea_orm(string_value = "BUSY")]
    Busy,
    #[sea_orm(string_value = "EN_ROUTE")]
    EnRoute,
}

impl DriverStatus {
    pub fn is_online(&self) -> bool {
        !matches!(self, DriverStatus::Offline)
    }

    /// Online and not already carrying a passenger.
    pub fn can_start_ride(&self) -> bool {
        matches!(self, DriverStatus::Available | DriverStatus::EnRoute)
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverStatus::Offline => write!(fmt, "OFFLINE"),
            DriverStatus::Available => write!(fmt, "AVAILABLE"),
            DriverStatus::Busy => write!(fmt, "BUSY"),
            DriverStatus::EnRoute => write!(fmt, "EN_ROUTE"),
        }
    }
}
