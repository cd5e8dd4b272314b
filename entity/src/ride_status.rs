use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a ride. COMPLETED and CANCELLED are terminal.
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ride_status")]
pub enum RideStatus {
    #[sea_orm(string_value = "REQUESTED")]
    #[default]
    Requested,
    #[sea_orm(string_value = "MATCHED")]
    Matched,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Forward-only progression; cancellation from any non-terminal status.
    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        use RideStatus::*;
        match (self, next) {
            (current, _) if current.is_terminal() => false,
            (_, Cancelled) => true,
            (Requested, Matched) | (Matched, InProgress) | (InProgress, Completed) => true,
            _ => false,
        }
    }

    /// Statuses from which a ride may still be cancelled.
    pub fn cancellable() -> [RideStatus; 3] {
        [RideStatus::Requested, RideStatus::Matched, RideStatus::InProgress]
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RideStatus::Requested => write!(fmt, "REQUESTED"),
            RideStatus::Matched => write!(fmt, "MATCHED"),
            RideStatus::InProgress => write!(fmt, "IN_PROGRESS"),
            RideStatus::Completed => write!(fmt, "COMPLETED"),
            RideStatus::Cancelled => write!(fmt, "CANCELLED"),
        }
    }
}
