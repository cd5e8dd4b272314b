//! Driver availability: sessions, status and current location.
//!
//! Every operation here that touches more than one table runs in a single
//! transaction, so a driver is never AVAILABLE without an open session or
//! OFFLINE with one.

use super::coordinate::{self, Point};
use super::error::{EntityApiErrorKind, Error};
use entity::coordinate_owner::CoordinateOwner;
use entity::driver_status::DriverStatus;
use entity::ride_status::RideStatus;
use entity::{coordinates, driver_sessions, drivers, rides, Id};
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ActiveValue::Unchanged, ConnectionTrait,
    DatabaseConnection, QueryOrder, QuerySelect, TransactionTrait, TryIntoModel,
};

/// Result of a successful go-online.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineSession {
    pub session: driver_sessions::Model,
    pub location: coordinates::Model,
}

/// Result of a successful go-offline.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub session: driver_sessions::Model,
    pub rides_completed: i32,
    pub earnings: f64,
    pub duration_hours: f64,
}

/// Opens a session, marks the driver AVAILABLE and records where they are.
///
/// Fails with `RecordConflict` if the driver already has an open session and
/// with `RecordNotFound` if the driver does not exist.
///
/// The status update runs first: it locks the driver row, so a concurrent
/// go-online waits for this transaction before looking for an open session.
pub async fn go_online(
    db: &DatabaseConnection,
    driver_id: Id,
    location: Point,
) -> Result<OnlineSession, Error> {
    debug!("Driver {driver_id} going online");

    let txn = db.begin().await?;

    set_status(&txn, driver_id, DriverStatus::Available).await?;

    if find_open_session(&txn, driver_id).await?.is_some() {
        debug!("Driver {driver_id} already has an open session");
        return Err(Error::kind(EntityApiErrorKind::RecordConflict));
    }

    let session = driver_sessions::ActiveModel {
        id: Set(Id::new_v4()),
        driver_id: Set(driver_id),
        started_at: Set(chrono::Utc::now().into()),
        ended_at: Set(None),
        total_rides: Set(0),
        total_earnings: Set(0.0),
    }
    .insert(&txn)
    .await?
    .try_into_model()?;

    let location =
        coordinate::replace_current(&txn, CoordinateOwner::Driver, driver_id, location).await?;

    txn.commit().await?;

    Ok(OnlineSession { session, location })
}

/// Closes the open session with its ride count and earnings and marks the
/// driver OFFLINE. Without an open session nothing changes and
/// `RecordNotUpdated` is returned.
pub async fn go_offline(db: &DatabaseConnection, driver_id: Id) -> Result<ClosedSession, Error> {
    debug!("Driver {driver_id} going offline");

    let txn = db.begin().await?;

    let open = find_open_session(&txn, driver_id).await?.ok_or_else(|| {
        debug!("Driver {driver_id} has no open session");
        Error::kind(EntityApiErrorKind::RecordNotUpdated)
    })?;

    let completed = rides::Entity::find()
        .filter(rides::Column::DriverId.eq(driver_id))
        .filter(rides::Column::Status.eq(RideStatus::Completed))
        .filter(rides::Column::CompletedAt.gte(open.started_at))
        .all(&txn)
        .await?;
    let rides_completed = i32::try_from(completed.len()).unwrap_or(i32::MAX);
    let earnings: f64 = completed.iter().filter_map(|ride| ride.final_fare).sum();

    let ended_at: DateTimeWithTimeZone = chrono::Utc::now().into();
    let session = driver_sessions::ActiveModel {
        id: Unchanged(open.id),
        driver_id: Unchanged(open.driver_id),
        started_at: Unchanged(open.started_at),
        ended_at: Set(Some(ended_at)),
        total_rides: Set(rides_completed),
        total_earnings: Set(earnings),
    }
    .update(&txn)
    .await?
    .try_into_model()?;

    set_status(&txn, driver_id, DriverStatus::Offline).await?;

    txn.commit().await?;

    let duration_hours = (ended_at - open.started_at).num_seconds() as f64 / 3600.0;

    Ok(ClosedSession {
        session,
        rides_completed,
        earnings,
        duration_hours,
    })
}

/// Result of a driver starting a ride.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedRide {
    pub ride: rides::Model,
    pub driver: drivers::Model,
}

/// Moves the ride to IN_PROGRESS and the driver to BUSY in one transaction.
///
/// A ride nobody has been matched to yet is claimed by the starting driver.
/// `RecordNotUpdated` comes back when the ride belongs to another driver or
/// cannot move to IN_PROGRESS, and when the driver is offline or already busy.
pub async fn start_ride(
    db: &DatabaseConnection,
    driver_id: Id,
    ride_id: Id,
) -> Result<StartedRide, Error> {
    debug!("Driver {driver_id} starting ride {ride_id}");

    let txn = db.begin().await?;

    let driver = drivers::Entity::find_by_id(driver_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::kind(EntityApiErrorKind::RecordNotFound))?;
    if !driver.status.can_start_ride() {
        debug!("Driver {driver_id} is {} and cannot start a ride", driver.status);
        return Err(Error::kind(EntityApiErrorKind::RecordNotUpdated));
    }

    let ride = rides::Entity::find_by_id(ride_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::kind(EntityApiErrorKind::RecordNotFound))?;

    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
    let mut status = ride.status;
    let mut matched_at = ride.matched_at;
    match ride.driver_id {
        Some(assigned) if assigned != driver_id => {
            debug!("Ride {ride_id} is assigned to driver {assigned}");
            return Err(Error::kind(EntityApiErrorKind::RecordNotUpdated));
        }
        Some(_) => {}
        None if status.can_transition_to(RideStatus::Matched) => {
            status = RideStatus::Matched;
            matched_at = Some(now);
        }
        None => {}
    }
    if !status.can_transition_to(RideStatus::InProgress) {
        debug!("Ride {ride_id} is {status} and cannot be started");
        return Err(Error::kind(EntityApiErrorKind::RecordNotUpdated));
    }

    let ride = rides::ActiveModel {
        id: Unchanged(ride.id),
        driver_id: Set(Some(driver_id)),
        status: Set(RideStatus::InProgress),
        matched_at: Set(matched_at),
        started_at: Set(Some(now)),
        updated_at: Set(now),
        ..Default::default()
    }
    .update(&txn)
    .await?
    .try_into_model()?;

    let driver = set_status(&txn, driver_id, DriverStatus::Busy).await?;

    txn.commit().await?;

    Ok(StartedRide { ride, driver })
}

/// Replaces an online driver's current coordinate. An offline driver yields
/// `RecordNotUpdated`; an unknown one `RecordNotFound`.
pub async fn update_location(
    db: &DatabaseConnection,
    driver_id: Id,
    location: Point,
) -> Result<coordinates::Model, Error> {
    let txn = db.begin().await?;

    let driver = drivers::Entity::find_by_id(driver_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::kind(EntityApiErrorKind::RecordNotFound))?;
    if !driver.status.is_online() {
        debug!("Ignoring location from offline driver {driver_id}");
        return Err(Error::kind(EntityApiErrorKind::RecordNotUpdated));
    }

    let location =
        coordinate::replace_current(&txn, CoordinateOwner::Driver, driver_id, location).await?;

    txn.commit().await?;

    Ok(location)
}

pub async fn find_open_session(
    db: &impl ConnectionTrait,
    driver_id: Id,
) -> Result<Option<driver_sessions::Model>, Error> {
    Ok(driver_sessions::Entity::find()
        .filter(driver_sessions::Column::DriverId.eq(driver_id))
        .filter(driver_sessions::Column::EndedAt.is_null())
        .order_by_desc(driver_sessions::Column::StartedAt)
        .one(db)
        .await?)
}

async fn set_status(
    db: &impl ConnectionTrait,
    driver_id: Id,
    status: DriverStatus,
) -> Result<drivers::Model, Error> {
    let updated = drivers::Entity::update_many()
        .set(drivers::ActiveModel {
            status: Set(status),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        })
        .filter(drivers::Column::Id.eq(driver_id))
        .exec_with_returning(db)
        .await?;

    updated
        .into_iter()
        .next()
        .ok_or_else(|| Error::kind(EntityApiErrorKind::RecordNotFound))
}
