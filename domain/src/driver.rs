//! Driver side use cases: availability sessions and live location.

use crate::error::Error;
use crate::outcome::Outcome;
use crate::repository::DriverRepository;
use crate::rules;
use broker::Publisher;
use chrono::Utc;
use entity::driver_status::DriverStatus;
use entity::{coordinates, Id};
use entity_api::coordinate::Point;
use entity_api::driver::{ClosedSession, OnlineSession, StartedRide};
use events::{Coordinates, DriverStatusEvent, LocationUpdateEvent, RideStatusEvent};
use log::*;
use push::{ActorId, Hub, Notification};
use std::sync::Arc;

/// A position report from a driver's device.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub heading_degrees: Option<f64>,
    /// The ride the driver is serving, if any.
    pub ride_id: Option<Id>,
}

pub struct DriverService {
    drivers: Arc<dyn DriverRepository>,
    publisher: Publisher,
    hub: Arc<Hub>,
}

impl DriverService {
    pub fn new(drivers: Arc<dyn DriverRepository>, publisher: Publisher, hub: Arc<Hub>) -> Self {
        Self {
            drivers,
            publisher,
            hub,
        }
    }

    pub async fn go_online(
        &self,
        driver_id: Id,
        latitude: f64,
        longitude: f64,
        correlation_id: &str,
    ) -> Result<Outcome<OnlineSession>, Error> {
        rules::require_id(driver_id, "driver_id")?;
        rules::validate_driver_position(latitude, longitude)?;

        let online = self
            .drivers
            .go_online(
                driver_id,
                Point {
                    latitude,
                    longitude,
                    address: None,
                },
            )
            .await?;

        info!(
            "Driver {driver_id} online with session {} [{correlation_id}]",
            online.session.id
        );

        let mut outcome = Outcome::new(online);
        let session_id = outcome.value.session.id;
        self.announce(
            &mut outcome,
            driver_id,
            DriverStatus::Available,
            session_id,
            "You are now online and ready to accept rides",
            correlation_id,
        )
        .await;

        Ok(outcome)
    }

    pub async fn go_offline(
        &self,
        driver_id: Id,
        correlation_id: &str,
    ) -> Result<Outcome<ClosedSession>, Error> {
        rules::require_id(driver_id, "driver_id")?;

        let closed = self.drivers.go_offline(driver_id).await?;

        info!(
            "Driver {driver_id} offline after {:.2}h, {} rides [{correlation_id}]",
            closed.duration_hours, closed.rides_completed
        );

        let mut outcome = Outcome::new(closed);
        let session_id = outcome.value.session.id;
        self.announce(
            &mut outcome,
            driver_id,
            DriverStatus::Offline,
            session_id,
            "You are now offline",
            correlation_id,
        )
        .await;

        Ok(outcome)
    }

    /// Stores the driver's position and broadcasts it. Nothing is pushed back
    /// to the driver.
    pub async fn update_location(
        &self,
        driver_id: Id,
        update: LocationUpdate,
        correlation_id: &str,
    ) -> Result<Outcome<coordinates::Model>, Error> {
        rules::require_id(driver_id, "driver_id")?;
        rules::validate_driver_position(update.latitude, update.longitude)?;
        rules::validate_motion(update.speed_kmh, update.heading_degrees)?;

        let location = self
            .drivers
            .update_location(
                driver_id,
                Point {
                    latitude: update.latitude,
                    longitude: update.longitude,
                    address: None,
                },
            )
            .await?;

        trace!("Driver {driver_id} at ({}, {})", location.latitude, location.longitude);

        let mut outcome = Outcome::new(location);
        let event = LocationUpdateEvent {
            driver_id,
            ride_id: update.ride_id,
            location: Coordinates {
                lat: update.latitude,
                lng: update.longitude,
            },
            speed_kmh: update.speed_kmh,
            heading_degrees: update.heading_degrees,
            timestamp: Utc::now(),
        };
        outcome.note_publish(
            "driver location",
            self.publisher.publish_event(&event, correlation_id).await,
        );

        Ok(outcome)
    }

    /// The driver picks up the passenger: the ride goes IN_PROGRESS and the
    /// driver BUSY. Both changes are broadcast and pushed to each party.
    pub async fn start_ride(
        &self,
        driver_id: Id,
        ride_id: Id,
        correlation_id: &str,
    ) -> Result<Outcome<StartedRide>, Error> {
        rules::require_id(driver_id, "driver_id")?;
        rules::require_id(ride_id, "ride_id")?;

        let started = self.drivers.start_ride(driver_id, ride_id).await?;

        info!("Driver {driver_id} started ride {ride_id} [{correlation_id}]");

        let ride = started.ride.clone();
        let mut outcome = Outcome::new(started);

        let ride_event = RideStatusEvent {
            ride_id,
            status: ride.status.to_string(),
            passenger_id: ride.passenger_id,
            timestamp: Utc::now(),
        };
        outcome.note_publish(
            "ride status",
            self.publisher.publish_event(&ride_event, correlation_id).await,
        );

        let driver_event = DriverStatusEvent {
            driver_id,
            status: DriverStatus::Busy.to_string(),
            ride_id: Some(ride_id),
            session_id: None,
            timestamp: Utc::now(),
            correlation_id: correlation_id.to_string(),
        };
        outcome.note_publish(
            "driver status",
            self.publisher
                .publish_event(&driver_event, correlation_id)
                .await,
        );

        outcome.note_push(
            "status update",
            self.hub.send(
                &ActorId::driver(driver_id.to_string()),
                &Notification::StatusUpdate {
                    status: DriverStatus::Busy.to_string(),
                    message: "Ride started successfully".to_string(),
                    ride_id: Some(ride_id.to_string()),
                },
            ),
        );
        outcome.note_push(
            "ride update",
            self.hub.send(
                &ActorId::passenger(ride.passenger_id.to_string()),
                &Notification::RideUpdate {
                    ride_id: ride_id.to_string(),
                    status: ride.status.to_string(),
                    message: "Your ride has started".to_string(),
                },
            ),
        );

        Ok(outcome)
    }

    async fn announce<T>(
        &self,
        outcome: &mut Outcome<T>,
        driver_id: Id,
        status: DriverStatus,
        session_id: Id,
        message: &str,
        correlation_id: &str,
    ) {
        let event = DriverStatusEvent {
            driver_id,
            status: status.to_string(),
            ride_id: None,
            session_id: Some(session_id),
            timestamp: Utc::now(),
            correlation_id: correlation_id.to_string(),
        };
        outcome.note_publish(
            "driver status",
            self.publisher.publish_event(&event, correlation_id).await,
        );

        outcome.note_push(
            "status update",
            self.hub.send(
                &ActorId::driver(driver_id.to_string()),
                &Notification::StatusUpdate {
                    status: status.to_string(),
                    message: message.to_string(),
                    ride_id: None,
                },
            ),
        );
    }
}
