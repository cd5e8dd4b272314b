//! In-memory repositories with the same contracts as the SeaORM adapters.

use super::{DriverRepository, RideRepository};
use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use async_trait::async_trait;
use chrono::Utc;
use entity::coordinate_owner::CoordinateOwner;
use entity::driver_status::DriverStatus;
use entity::ride_status::RideStatus;
use entity::{coordinates, driver_sessions, drivers, rides, Id};
use entity_api::coordinate::Point;
use entity_api::driver::{ClosedSession, OnlineSession, StartedRide};
use entity_api::ride::NewRide;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn entity_error(kind: EntityErrorKind) -> Error {
    Error {
        source: None,
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(kind)),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn coordinate(
    owner: CoordinateOwner,
    entity_id: Id,
    point: Point,
    is_current: bool,
) -> coordinates::Model {
    let now = Utc::now();
    coordinates::Model {
        id: Id::new_v4(),
        entity_id,
        entity_type: owner,
        address: point.address,
        latitude: point.latitude,
        longitude: point.longitude,
        is_current,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

#[derive(Default)]
pub struct InMemoryRideRepository {
    rides: Mutex<HashMap<Id, rides::Model>>,
    coordinates: Mutex<Vec<coordinates::Model>>,
    unavailable: Mutex<bool>,
}

impl InMemoryRideRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        *lock(&self.unavailable) = unavailable;
    }

    pub fn get(&self, ride_id: Id) -> Option<rides::Model> {
        lock(&self.rides).get(&ride_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.rides).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coordinates(&self) -> Vec<coordinates::Model> {
        lock(&self.coordinates).clone()
    }

    /// Forces a stored ride into `status`, e.g. to simulate a driver match.
    pub fn set_status(&self, ride_id: Id, status: RideStatus) {
        if let Some(ride) = lock(&self.rides).get_mut(&ride_id) {
            ride.status = status;
        }
    }

    fn check_available(&self) -> Result<(), Error> {
        if *lock(&self.unavailable) {
            return Err(entity_error(EntityErrorKind::DbTransaction));
        }
        Ok(())
    }
}

#[async_trait]
impl RideRepository for InMemoryRideRepository {
    async fn create(&self, new_ride: NewRide) -> Result<rides::Model, Error> {
        self.check_available()?;

        let mut rides = lock(&self.rides);
        if rides.values().any(|r| r.ride_number == new_ride.ride_number) {
            return Err(entity_error(EntityErrorKind::Conflict));
        }

        let pickup = coordinate(
            CoordinateOwner::Passenger,
            new_ride.passenger_id,
            new_ride.pickup,
            true,
        );
        let destination = coordinate(
            CoordinateOwner::Passenger,
            new_ride.passenger_id,
            new_ride.destination,
            false,
        );

        let now = Utc::now();
        let ride = rides::Model {
            id: Id::new_v4(),
            ride_number: new_ride.ride_number,
            passenger_id: new_ride.passenger_id,
            driver_id: None,
            vehicle_type: new_ride.vehicle_type,
            status: RideStatus::Requested,
            priority: 1,
            requested_at: now.into(),
            matched_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            estimated_fare: Some(new_ride.estimated_fare),
            final_fare: None,
            pickup_coordinate_id: pickup.id,
            destination_coordinate_id: destination.id,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let mut coordinates = lock(&self.coordinates);
        coordinates.push(pickup);
        coordinates.push(destination);
        rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn cancel(
        &self,
        ride_id: Id,
        passenger_id: Id,
        reason: Option<String>,
    ) -> Result<rides::Model, Error> {
        self.check_available()?;

        let mut rides = lock(&self.rides);
        let ride = rides
            .get_mut(&ride_id)
            .filter(|ride| {
                ride.passenger_id == passenger_id
                    && RideStatus::cancellable().contains(&ride.status)
            })
            .ok_or_else(|| entity_error(EntityErrorKind::NotFoundOrInvalidState))?;

        let now = Utc::now();
        ride.status = RideStatus::Cancelled;
        ride.cancelled_at = Some(now.into());
        ride.cancellation_reason = reason;
        ride.updated_at = now.into();
        Ok(ride.clone())
    }

    async fn latest_ride_number(&self, prefix: &str) -> Result<Option<String>, Error> {
        self.check_available()?;

        Ok(lock(&self.rides)
            .values()
            .map(|ride| &ride.ride_number)
            .filter(|number| number.starts_with(prefix))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .cloned())
    }
}

#[derive(Default)]
struct DriverTables {
    statuses: HashMap<Id, DriverStatus>,
    sessions: Vec<driver_sessions::Model>,
    locations: Vec<coordinates::Model>,
}

#[derive(Default)]
pub struct InMemoryDriverRepository {
    tables: Mutex<DriverTables>,
    rides: Arc<InMemoryRideRepository>,
}

impl InMemoryDriverRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares the ride table with a ride repository so drivers can start
    /// rides passengers requested.
    pub fn with_rides(rides: Arc<InMemoryRideRepository>) -> Self {
        Self {
            tables: Mutex::default(),
            rides,
        }
    }

    /// Registers an OFFLINE driver.
    pub fn add_driver(&self, driver_id: Id) {
        lock(&self.tables)
            .statuses
            .insert(driver_id, DriverStatus::Offline);
    }

    pub fn status(&self, driver_id: Id) -> Option<DriverStatus> {
        lock(&self.tables).statuses.get(&driver_id).copied()
    }

    pub fn sessions(&self, driver_id: Id) -> Vec<driver_sessions::Model> {
        lock(&self.tables)
            .sessions
            .iter()
            .filter(|s| s.driver_id == driver_id)
            .cloned()
            .collect()
    }

    pub fn current_location(&self, driver_id: Id) -> Option<coordinates::Model> {
        lock(&self.tables)
            .locations
            .iter()
            .find(|c| c.entity_id == driver_id && c.is_current)
            .cloned()
    }

    fn replace_current(
        tables: &mut DriverTables,
        driver_id: Id,
        point: Point,
    ) -> coordinates::Model {
        for existing in tables
            .locations
            .iter_mut()
            .filter(|c| c.entity_id == driver_id)
        {
            existing.is_current = false;
        }
        let location = coordinate(CoordinateOwner::Driver, driver_id, point, true);
        tables.locations.push(location.clone());
        location
    }
}

#[async_trait]
impl DriverRepository for InMemoryDriverRepository {
    async fn go_online(&self, driver_id: Id, location: Point) -> Result<OnlineSession, Error> {
        let mut tables = lock(&self.tables);

        if tables
            .sessions
            .iter()
            .any(|s| s.driver_id == driver_id && s.ended_at.is_none())
        {
            return Err(entity_error(EntityErrorKind::Conflict));
        }
        match tables.statuses.get_mut(&driver_id) {
            Some(status) => *status = DriverStatus::Available,
            None => return Err(entity_error(EntityErrorKind::NotFound)),
        }

        let session = driver_sessions::Model {
            id: Id::new_v4(),
            driver_id,
            started_at: Utc::now().into(),
            ended_at: None,
            total_rides: 0,
            total_earnings: 0.0,
        };
        tables.sessions.push(session.clone());
        let location = Self::replace_current(&mut tables, driver_id, location);

        Ok(OnlineSession { session, location })
    }

    async fn go_offline(&self, driver_id: Id) -> Result<ClosedSession, Error> {
        let mut tables = lock(&self.tables);

        let ended_at = Utc::now();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.driver_id == driver_id && s.ended_at.is_none())
            .ok_or_else(|| entity_error(EntityErrorKind::NotFoundOrInvalidState))?;
        session.ended_at = Some(ended_at.into());
        let session = session.clone();

        tables.statuses.insert(driver_id, DriverStatus::Offline);

        let duration_hours =
            (ended_at - session.started_at.to_utc()).num_seconds() as f64 / 3600.0;
        Ok(ClosedSession {
            rides_completed: session.total_rides,
            earnings: session.total_earnings,
            session,
            duration_hours,
        })
    }

    async fn update_location(
        &self,
        driver_id: Id,
        location: Point,
    ) -> Result<coordinates::Model, Error> {
        let mut tables = lock(&self.tables);

        match tables.statuses.get(&driver_id) {
            None => return Err(entity_error(EntityErrorKind::NotFound)),
            Some(status) if !status.is_online() => {
                return Err(entity_error(EntityErrorKind::NotFoundOrInvalidState))
            }
            Some(_) => {}
        }

        Ok(Self::replace_current(&mut tables, driver_id, location))
    }

    async fn start_ride(&self, driver_id: Id, ride_id: Id) -> Result<StartedRide, Error> {
        let mut tables = lock(&self.tables);
        let mut rides = lock(&self.rides.rides);

        match tables.statuses.get(&driver_id) {
            None => return Err(entity_error(EntityErrorKind::NotFound)),
            Some(status) if !status.can_start_ride() => {
                return Err(entity_error(EntityErrorKind::NotFoundOrInvalidState))
            }
            Some(_) => {}
        }

        let ride = rides
            .get_mut(&ride_id)
            .ok_or_else(|| entity_error(EntityErrorKind::NotFound))?;
        let now = Utc::now();
        let mut status = ride.status;
        let mut matched_at = ride.matched_at;
        match ride.driver_id {
            Some(assigned) if assigned != driver_id => {
                return Err(entity_error(EntityErrorKind::NotFoundOrInvalidState))
            }
            Some(_) => {}
            None if status.can_transition_to(RideStatus::Matched) => {
                status = RideStatus::Matched;
                matched_at = Some(now.into());
            }
            None => {}
        }
        if !status.can_transition_to(RideStatus::InProgress) {
            return Err(entity_error(EntityErrorKind::NotFoundOrInvalidState));
        }

        ride.driver_id = Some(driver_id);
        ride.status = RideStatus::InProgress;
        ride.matched_at = matched_at;
        ride.started_at = Some(now.into());
        ride.updated_at = now.into();
        let ride = ride.clone();

        tables.statuses.insert(driver_id, DriverStatus::Busy);
        let driver = drivers::Model {
            id: driver_id,
            status: DriverStatus::Busy,
            created_at: now.into(),
            updated_at: now.into(),
        };

        Ok(StartedRide { ride, driver })
    }
}
