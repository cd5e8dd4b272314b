use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of actor a coordinate row belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "coordinate_entity_type"
)]
pub enum CoordinateOwner {
    #[sea_orm(string_value = "passenger")]
    Passenger,
    #[sea_orm(string_value = "driver")]
    Driver,
}
