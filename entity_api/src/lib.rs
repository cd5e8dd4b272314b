//! SeaORM-backed queries and transactional writes for the Ride Hail tables.

pub use entity::{coordinates, driver_sessions, drivers, rides, Id};

pub mod coordinate;
pub mod driver;
pub mod error;
pub mod ride;
