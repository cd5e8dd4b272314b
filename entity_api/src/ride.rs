//! Queries and writes for the rides table.

use super::coordinate::{self, Point};
use super::error::{EntityApiErrorKind, Error};
use entity::coordinate_owner::CoordinateOwner;
use entity::ride_status::RideStatus;
use entity::rides::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Func, SimpleExpr},
    ActiveValue::Set,
    Condition, ConnectionTrait, DatabaseConnection, QueryOrder, TransactionTrait, TryIntoModel,
};

/// Everything needed to store a freshly requested ride.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRide {
    pub ride_number: String,
    pub passenger_id: Id,
    pub vehicle_type: String,
    pub estimated_fare: f64,
    pub pickup: Point,
    pub destination: Point,
}

/// Stores the pickup and destination coordinates and a REQUESTED ride
/// referencing them, atomically.
pub async fn create(db: &DatabaseConnection, new_ride: NewRide) -> Result<Model, Error> {
    debug!(
        "Creating ride {} for passenger {}",
        new_ride.ride_number, new_ride.passenger_id
    );

    let txn = db.begin().await?;

    // The passenger is standing at the pickup point, so it becomes current.
    let pickup = coordinate::insert(
        &txn,
        CoordinateOwner::Passenger,
        new_ride.passenger_id,
        new_ride.pickup,
        true,
    )
    .await?;
    let destination = coordinate::insert(
        &txn,
        CoordinateOwner::Passenger,
        new_ride.passenger_id,
        new_ride.destination,
        false,
    )
    .await?;

    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        ride_number: Set(new_ride.ride_number),
        passenger_id: Set(new_ride.passenger_id),
        driver_id: Set(None),
        vehicle_type: Set(new_ride.vehicle_type),
        status: Set(RideStatus::Requested),
        priority: Set(1),
        requested_at: Set(now.into()),
        matched_at: Set(None),
        started_at: Set(None),
        completed_at: Set(None),
        cancelled_at: Set(None),
        cancellation_reason: Set(None),
        estimated_fare: Set(Some(new_ride.estimated_fare)),
        final_fare: Set(None),
        pickup_coordinate_id: Set(pickup.id),
        destination_coordinate_id: Set(destination.id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let ride = active_model.insert(&txn).await?.try_into_model()?;

    txn.commit().await?;

    Ok(ride)
}

/// Cancels the passenger's ride in a single conditional update. A ride that
/// does not exist, belongs to someone else, or is already terminal matches no
/// row and yields `RecordNotUpdated`.
pub async fn cancel(
    db: &impl ConnectionTrait,
    ride_id: Id,
    passenger_id: Id,
    reason: Option<String>,
) -> Result<Model, Error> {
    debug!("Cancelling ride {ride_id} for passenger {passenger_id}");

    let now = chrono::Utc::now();
    let updated = Entity::update_many()
        .set(ActiveModel {
            status: Set(RideStatus::Cancelled),
            cancelled_at: Set(Some(now.into())),
            cancellation_reason: Set(reason),
            updated_at: Set(now.into()),
            ..Default::default()
        })
        .filter(
            Condition::all()
                .add(Column::Id.eq(ride_id))
                .add(Column::PassengerId.eq(passenger_id))
                .add(Column::Status.is_in(RideStatus::cancellable())),
        )
        .exec_with_returning(db)
        .await?;

    updated.into_iter().next().ok_or_else(|| {
        debug!("Ride {ride_id} not found or no longer cancellable");
        Error::kind(EntityApiErrorKind::RecordNotUpdated)
    })
}

/// Highest stored ride number starting with `prefix`, e.g. `RIDE_20240115_`.
/// Longer numbers sort first so that `_1000` outranks `_999`.
pub async fn latest_number(
    db: &impl ConnectionTrait,
    prefix: &str,
) -> Result<Option<String>, Error> {
    let latest = Entity::find()
        .filter(Column::RideNumber.starts_with(prefix))
        .order_by_desc(SimpleExpr::from(Func::char_length(Expr::col(
            Column::RideNumber,
        ))))
        .order_by_desc(Column::RideNumber)
        .one(db)
        .await?;

    Ok(latest.map(|ride| ride.ride_number))
}
