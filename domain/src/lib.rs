//! Ride Hail use cases.
//!
//! Every use case follows the same shape: validate, persist, publish, push.
//! Validation and persistence failures are errors. Publish and push failures
//! happen after the commit point and are reported as degradations on the
//! returned `Outcome`.
//!
//! This module also re-exports the `entity_api` items the web layer needs so
//! that consumers of the `domain` crate do not need to depend on `entity_api`
//! directly.
pub use entity_api::coordinate::Point;
pub use entity_api::driver::{ClosedSession, OnlineSession, StartedRide};
pub use entity::driver_status::DriverStatus;
pub use entity::ride_status::RideStatus;

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{coordinates, driver_sessions, drivers, rides, Id};

pub mod driver;
pub mod error;
pub mod fare;
pub mod jwt;
pub mod outcome;
pub mod repository;
pub mod ride;
pub mod ride_number;
pub mod rules;
