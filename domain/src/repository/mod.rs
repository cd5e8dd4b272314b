//! Persistence ports used by the orchestrators, and their SeaORM adapters.
//!
//! The use cases only ever see these traits, so tests can swap in the
//! in-memory adapters from `repository::memory` and never touch Postgres.

use crate::error::Error;
use async_trait::async_trait;
use entity::{coordinates, rides, Id};
use entity_api::coordinate::Point;
use entity_api::driver::{ClosedSession, OnlineSession, StartedRide};
use entity_api::ride::NewRide;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[cfg(any(test, feature = "mock"))]
pub mod memory;

#[async_trait]
pub trait RideRepository: Send + Sync {
    /// Stores a REQUESTED ride and its pickup and destination atomically.
    async fn create(&self, new_ride: NewRide) -> Result<rides::Model, Error>;

    /// Cancels the passenger's ride if it is still cancellable. Anything else
    /// is `NotFoundOrInvalidState`.
    async fn cancel(
        &self,
        ride_id: Id,
        passenger_id: Id,
        reason: Option<String>,
    ) -> Result<rides::Model, Error>;

    /// Highest ride number already stored that starts with `prefix`.
    async fn latest_ride_number(&self, prefix: &str) -> Result<Option<String>, Error>;
}

#[async_trait]
pub trait DriverRepository: Send + Sync {
    /// Fails with `Conflict` while a session is already open.
    async fn go_online(&self, driver_id: Id, location: Point) -> Result<OnlineSession, Error>;

    /// Fails with `NotFoundOrInvalidState` when no session is open.
    async fn go_offline(&self, driver_id: Id) -> Result<ClosedSession, Error>;

    /// Fails with `NotFoundOrInvalidState` when the driver is offline.
    async fn update_location(
        &self,
        driver_id: Id,
        location: Point,
    ) -> Result<coordinates::Model, Error>;

    /// Fails with `NotFoundOrInvalidState` when the ride is someone else's or
    /// cannot start, or the driver is not free to take it.
    async fn start_ride(&self, driver_id: Id, ride_id: Id) -> Result<StartedRide, Error>;
}

pub struct SeaOrmRideRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmRideRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RideRepository for SeaOrmRideRepository {
    async fn create(&self, new_ride: NewRide) -> Result<rides::Model, Error> {
        Ok(entity_api::ride::create(&self.db, new_ride).await?)
    }

    async fn cancel(
        &self,
        ride_id: Id,
        passenger_id: Id,
        reason: Option<String>,
    ) -> Result<rides::Model, Error> {
        Ok(entity_api::ride::cancel(self.db.as_ref(), ride_id, passenger_id, reason).await?)
    }

    async fn latest_ride_number(&self, prefix: &str) -> Result<Option<String>, Error> {
        Ok(entity_api::ride::latest_number(self.db.as_ref(), prefix).await?)
    }
}

pub struct SeaOrmDriverRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmDriverRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DriverRepository for SeaOrmDriverRepository {
    async fn go_online(&self, driver_id: Id, location: Point) -> Result<OnlineSession, Error> {
        Ok(entity_api::driver::go_online(&self.db, driver_id, location).await?)
    }

    async fn go_offline(&self, driver_id: Id) -> Result<ClosedSession, Error> {
        Ok(entity_api::driver::go_offline(&self.db, driver_id).await?)
    }

    async fn update_location(
        &self,
        driver_id: Id,
        location: Point,
    ) -> Result<coordinates::Model, Error> {
        Ok(entity_api::driver::update_location(&self.db, driver_id, location).await?)
    }

    async fn start_ride(&self, driver_id: Id, ride_id: Id) -> Result<StartedRide, Error> {
        Ok(entity_api::driver::start_ride(&self.db, driver_id, ride_id).await?)
    }
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn cancel_with_no_matching_row_is_not_found_or_invalid_state() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<rides::Model>::new()])
            .into_connection();
        let repository = SeaOrmRideRepository::new(Arc::new(db));

        let err = repository
            .cancel(Id::new_v4(), Id::new_v4(), None)
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFoundOrInvalidState
            ))
        );
    }
}
