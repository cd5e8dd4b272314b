use uuid::Uuid;

// Tables
pub mod coordinates;
pub mod driver_sessions;
pub mod drivers;
pub mod rides;

// Enumerations
pub mod coordinate_owner;
pub mod driver_status;
pub mod ride_status;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
