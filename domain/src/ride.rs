//! Passenger side use cases: requesting and cancelling rides.

use crate::error::Error;
use crate::fare::{FareEstimator, FareQuote};
use crate::outcome::Outcome;
use crate::repository::RideRepository;
use crate::ride_number::RideNumberGenerator;
use crate::rules::{self, RideCatalog};
use broker::Publisher;
use chrono::{DateTime, Utc};
use entity::{rides, Id};
use entity_api::coordinate::Point;
use entity_api::ride::NewRide;
use events::{LocationPoint, RideRequestedEvent, RideStatusEvent, RIDE_REQUEST_TIMEOUT_SECONDS};
use log::*;
use push::{ActorId, Hub, Notification};
use std::sync::Arc;

/// Search radius offered to driver matching with every request.
pub const MAX_PICKUP_DISTANCE_KM: f64 = 5.0;

const RIDE_NUMBER_ATTEMPTS: u32 = 3;

/// A passenger's request for a ride, as received from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRequest {
    pub passenger_id: Id,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: String,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub destination_address: String,
    pub ride_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRide {
    pub ride: rides::Model,
    pub quote: FareQuote,
}

pub struct RideService {
    rides: Arc<dyn RideRepository>,
    publisher: Publisher,
    hub: Arc<Hub>,
    catalog: RideCatalog,
    fares: Arc<dyn FareEstimator>,
    numbers: RideNumberGenerator,
}

impl RideService {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        publisher: Publisher,
        hub: Arc<Hub>,
        catalog: RideCatalog,
        fares: Arc<dyn FareEstimator>,
    ) -> Self {
        Self {
            rides,
            publisher,
            hub,
            catalog,
            fares,
            numbers: RideNumberGenerator::new(),
        }
    }

    pub fn catalog(&self) -> &RideCatalog {
        &self.catalog
    }

    pub async fn create_ride(
        &self,
        request: RideRequest,
        correlation_id: &str,
    ) -> Result<Outcome<CreatedRide>, Error> {
        rules::require_id(request.passenger_id, "passenger_id")?;
        rules::validate_coordinates(request.pickup_latitude, request.pickup_longitude)?;
        rules::validate_coordinates(request.destination_latitude, request.destination_longitude)?;
        rules::require_address(&request.pickup_address, "pickup_address")?;
        rules::require_address(&request.destination_address, "destination_address")?;
        let ride_type = self.catalog.normalize(&request.ride_type)?;

        let pickup = (request.pickup_latitude, request.pickup_longitude);
        let destination = (request.destination_latitude, request.destination_longitude);
        let quote = self.fares.estimate(&ride_type, pickup, destination)?;

        let new_ride = NewRide {
            ride_number: String::new(),
            passenger_id: request.passenger_id,
            vehicle_type: ride_type.clone(),
            estimated_fare: quote.fare,
            pickup: Point {
                latitude: pickup.0,
                longitude: pickup.1,
                address: Some(request.pickup_address.clone()),
            },
            destination: Point {
                latitude: destination.0,
                longitude: destination.1,
                address: Some(request.destination_address.clone()),
            },
        };
        let ride = self.store_numbered(new_ride).await?;

        info!(
            "Ride {} ({}) requested by passenger {} [{correlation_id}]",
            ride.ride_number, ride.id, ride.passenger_id
        );

        let mut outcome = Outcome::new(CreatedRide {
            ride: ride.clone(),
            quote,
        });

        let status_event = RideStatusEvent {
            ride_id: ride.id,
            status: ride.status.to_string(),
            passenger_id: ride.passenger_id,
            timestamp: Utc::now(),
        };
        outcome.note_publish(
            "ride status",
            self.publisher
                .publish_event(&status_event, correlation_id)
                .await,
        );

        let request_event = RideRequestedEvent {
            ride_id: ride.id,
            ride_number: ride.ride_number.clone(),
            pickup_location: LocationPoint {
                lat: pickup.0,
                lng: pickup.1,
                address: Some(request.pickup_address),
            },
            destination_location: LocationPoint {
                lat: destination.0,
                lng: destination.1,
                address: Some(request.destination_address),
            },
            ride_type,
            estimated_fare: quote.fare,
            max_distance_km: MAX_PICKUP_DISTANCE_KM,
            timeout_seconds: RIDE_REQUEST_TIMEOUT_SECONDS,
            correlation_id: correlation_id.to_string(),
        };
        outcome.note_publish(
            "ride request",
            self.publisher
                .publish_event(&request_event, correlation_id)
                .await,
        );

        outcome.note_push(
            "ride update",
            self.hub.send(
                &ActorId::passenger(ride.passenger_id.to_string()),
                &Notification::RideUpdate {
                    ride_id: ride.id.to_string(),
                    status: ride.status.to_string(),
                    message: "Your ride has been requested. Looking for a driver...".to_string(),
                },
            ),
        );

        Ok(outcome)
    }

    /// Stores the ride under the next free ride number. A number taken by
    /// another writer reseeds the counter from the store and tries again.
    async fn store_numbered(&self, mut new_ride: NewRide) -> Result<rides::Model, Error> {
        let mut attempt = 1;
        loop {
            let now = Utc::now();
            if !self.numbers.is_seeded_for(now) {
                self.seed_ride_numbers(now).await?;
            }
            new_ride.ride_number = self.numbers.next(now);

            match self.rides.create(new_ride.clone()).await {
                Err(e) if e.is_conflict() && attempt < RIDE_NUMBER_ATTEMPTS => {
                    warn!(
                        "Ride number {} already taken, reseeding",
                        new_ride.ride_number
                    );
                    self.seed_ride_numbers(now).await?;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn seed_ride_numbers(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let prefix = RideNumberGenerator::prefix(now);
        let latest = self.rides.latest_ride_number(&prefix).await?;
        debug!("Seeding ride numbers for {prefix} from {latest:?}");
        self.numbers.seed(now, latest.as_deref());
        Ok(())
    }

    pub async fn cancel_ride(
        &self,
        ride_id: Id,
        passenger_id: Id,
        reason: Option<String>,
        correlation_id: &str,
    ) -> Result<Outcome<rides::Model>, Error> {
        rules::require_id(ride_id, "ride_id")?;
        rules::require_id(passenger_id, "passenger_id")?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        rules::validate_reason(reason.as_deref())?;

        let ride = self.rides.cancel(ride_id, passenger_id, reason).await?;

        info!("Ride {ride_id} cancelled by passenger {passenger_id} [{correlation_id}]");

        let mut outcome = Outcome::new(ride.clone());

        let status_event = RideStatusEvent {
            ride_id: ride.id,
            status: ride.status.to_string(),
            passenger_id: ride.passenger_id,
            timestamp: Utc::now(),
        };
        outcome.note_publish(
            "ride status",
            self.publisher
                .publish_event(&status_event, correlation_id)
                .await,
        );

        outcome.note_push(
            "ride update",
            self.hub.send(
                &ActorId::passenger(passenger_id.to_string()),
                &Notification::RideUpdate {
                    ride_id: ride.id.to_string(),
                    status: ride.status.to_string(),
                    message: "Your ride has been cancelled".to_string(),
                },
            ),
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
    use crate::fare::TariffFareEstimator;
    use crate::outcome::DegradationKind;
    use crate::repository::memory::InMemoryRideRepository;
    use broker::memory::MemoryBroker;
    use broker::ConnectionManager;
    use entity::ride_status::RideStatus;
    use push::testing;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        service: RideService,
        rides: Arc<InMemoryRideRepository>,
        broker: MemoryBroker,
        hub: Arc<Hub>,
        manager: Arc<ConnectionManager>,
    }

    async fn harness() -> Harness {
        let broker = MemoryBroker::new();
        let manager = Arc::new(ConnectionManager::new(
            "amqp://memory",
            broker.connector(),
            &CancellationToken::new(),
        ));
        manager.connect().await.unwrap();
        manager.declare_topology().await.unwrap();

        let rides = Arc::new(InMemoryRideRepository::new());
        let hub = Arc::new(Hub::new());
        let service = RideService::new(
            rides.clone(),
            Publisher::new(Arc::clone(&manager)),
            Arc::clone(&hub),
            RideCatalog::default(),
            Arc::new(TariffFareEstimator::standard()),
        );

        Harness {
            service,
            rides,
            broker,
            hub,
            manager,
        }
    }

    fn request(passenger_id: Id) -> RideRequest {
        RideRequest {
            passenger_id,
            pickup_latitude: 43.238949,
            pickup_longitude: 76.889709,
            pickup_address: "Almaty Central Park".to_string(),
            destination_latitude: 43.222015,
            destination_longitude: 76.851511,
            destination_address: "Kok-Tobe Hill".to_string(),
            ride_type: "economy".to_string(),
        }
    }

    #[tokio::test]
    async fn create_ride_persists_publishes_and_notifies() {
        let h = harness().await;
        let passenger_id = Id::new_v4();
        let mut client = testing::attach(&h.hub, ActorId::passenger(passenger_id.to_string()));

        let outcome = h
            .service
            .create_ride(request(passenger_id), "req-1")
            .await
            .unwrap();

        assert!(!outcome.is_degraded());
        let ride = &outcome.value.ride;
        assert_eq!(ride.status, RideStatus::Requested);
        assert_eq!(ride.vehicle_type, "ECONOMY");
        assert_eq!(ride.estimated_fare, Some(outcome.value.quote.fare));
        assert!(ride.ride_number.starts_with("RIDE_"));
        assert_eq!(h.rides.get(ride.id), Some(ride.clone()));

        let published = h.broker.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].routing_key, format!("ride.status.{}", ride.id));
        assert_eq!(published[0].json()["status"], "REQUESTED");
        assert_eq!(published[1].routing_key, "ride.request.ECONOMY");
        assert_eq!(published[1].json()["correlation_id"], "req-1");
        assert_eq!(published[1].json()["timeout_seconds"], 30);
        assert_eq!(
            published[1].json()["pickup_location"]["address"],
            "Almaty Central Park"
        );

        let frames = client.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "ride_update");
        assert_eq!(frames[0]["ride_id"], ride.id.to_string());
        assert_eq!(frames[0]["status"], "REQUESTED");

        h.manager.close().await;
    }

    #[tokio::test]
    async fn invalid_input_touches_nothing() {
        let h = harness().await;
        let mut bad = request(Id::new_v4());
        bad.pickup_latitude = 91.0;

        let err = h.service.create_ride(bad, "req-2").await.unwrap_err();

        assert!(matches!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Validation(_))
        ));
        assert!(h.rides.is_empty());
        assert!(h.broker.published().is_empty());

        let mut unknown_type = request(Id::new_v4());
        unknown_type.ride_type = "LIMO".to_string();
        assert!(h.service.create_ride(unknown_type, "req-3").await.is_err());
        assert!(h.rides.is_empty());

        h.manager.close().await;
    }

    #[tokio::test]
    async fn persistence_failure_is_fatal_and_nothing_is_published() {
        let h = harness().await;
        h.rides.set_unavailable(true);

        let err = h
            .service
            .create_ride(request(Id::new_v4()), "req-4")
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::DbTransaction))
        );
        assert!(h.broker.published().is_empty());

        h.manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn broker_outage_degrades_but_keeps_the_ride_and_still_pushes() {
        let h = harness().await;
        let passenger_id = Id::new_v4();
        let mut client = testing::attach(&h.hub, ActorId::passenger(passenger_id.to_string()));
        h.broker.set_reachable(false);
        h.broker.sever("node down");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let outcome = h
            .service
            .create_ride(request(passenger_id), "req-5")
            .await
            .unwrap();

        assert_eq!(outcome.severity(), Some(DegradationKind::PublishFailed));
        assert_eq!(outcome.degradations().len(), 2);
        assert!(h.rides.get(outcome.value.ride.id).is_some());
        assert_eq!(client.frames().len(), 1);

        h.manager.close().await;
    }

    #[tokio::test]
    async fn offline_passenger_only_degrades_the_notification() {
        let h = harness().await;

        let outcome = h
            .service
            .create_ride(request(Id::new_v4()), "req-6")
            .await
            .unwrap();

        assert_eq!(outcome.severity(), Some(DegradationKind::NotificationFailed));
        assert_eq!(h.broker.published().len(), 2);

        h.manager.close().await;
    }

    #[tokio::test]
    async fn cancel_ride_publishes_cancelled_and_notifies() {
        let h = harness().await;
        let passenger_id = Id::new_v4();
        let created = h
            .service
            .create_ride(request(passenger_id), "req-7")
            .await
            .unwrap()
            .value;
        let mut client = testing::attach(&h.hub, ActorId::passenger(passenger_id.to_string()));

        let outcome = h
            .service
            .cancel_ride(
                created.ride.id,
                passenger_id,
                Some("  changed my mind ".to_string()),
                "req-8",
            )
            .await
            .unwrap();

        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value.status, RideStatus::Cancelled);
        assert_eq!(
            outcome.value.cancellation_reason.as_deref(),
            Some("changed my mind")
        );
        assert!(outcome.value.cancelled_at.is_some());

        let published = h.broker.published();
        let last = published.last().unwrap();
        assert_eq!(last.routing_key, format!("ride.status.{}", created.ride.id));
        assert_eq!(last.json()["status"], "CANCELLED");
        assert_eq!(last.properties.correlation_id.as_deref(), Some("req-8"));

        let frames = client.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["status"], "CANCELLED");

        h.manager.close().await;
    }

    #[tokio::test]
    async fn cancelling_twice_or_someone_elses_ride_is_rejected() {
        let h = harness().await;
        let passenger_id = Id::new_v4();
        let ride_id = h
            .service
            .create_ride(request(passenger_id), "req-9")
            .await
            .unwrap()
            .value
            .ride
            .id;

        let stranger = h
            .service
            .cancel_ride(ride_id, Id::new_v4(), None, "req-10")
            .await
            .unwrap_err();
        assert_eq!(
            stranger.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFoundOrInvalidState
            ))
        );

        h.service
            .cancel_ride(ride_id, passenger_id, None, "req-11")
            .await
            .unwrap();
        let published_before = h.broker.published().len();

        let again = h
            .service
            .cancel_ride(ride_id, passenger_id, None, "req-12")
            .await
            .unwrap_err();
        assert_eq!(
            again.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFoundOrInvalidState
            ))
        );
        assert_eq!(h.broker.published().len(), published_before);

        h.manager.close().await;
    }

    #[tokio::test]
    async fn completed_rides_cannot_be_cancelled() {
        let h = harness().await;
        let passenger_id = Id::new_v4();
        let ride_id = h
            .service
            .create_ride(request(passenger_id), "req-14")
            .await
            .unwrap()
            .value
            .ride
            .id;
        h.rides.set_status(ride_id, RideStatus::Completed);
        let published_before = h.broker.published().len();

        let err = h
            .service
            .cancel_ride(ride_id, passenger_id, None, "req-15")
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFoundOrInvalidState
            ))
        );
        assert_eq!(h.rides.get(ride_id).unwrap().status, RideStatus::Completed);
        assert_eq!(h.broker.published().len(), published_before);

        h.manager.close().await;
    }

    fn second_service(h: &Harness) -> RideService {
        RideService::new(
            h.rides.clone(),
            Publisher::new(Arc::clone(&h.manager)),
            Arc::clone(&h.hub),
            RideCatalog::default(),
            Arc::new(TariffFareEstimator::standard()),
        )
    }

    fn sequence(ride: &rides::Model) -> &str {
        ride.ride_number.rsplit('_').next().unwrap()
    }

    #[tokio::test]
    async fn a_restarted_service_continues_the_days_numbering() {
        let h = harness().await;
        for correlation_id in ["req-16", "req-17"] {
            h.service
                .create_ride(request(Id::new_v4()), correlation_id)
                .await
                .unwrap();
        }

        let restarted = second_service(&h);
        let ride = restarted
            .create_ride(request(Id::new_v4()), "req-18")
            .await
            .unwrap()
            .value
            .ride;

        assert_eq!(sequence(&ride), "003");
        assert_eq!(h.rides.len(), 3);

        h.manager.close().await;
    }

    #[tokio::test]
    async fn a_number_taken_by_another_writer_is_skipped() {
        let h = harness().await;
        let other = second_service(&h);

        let first = h
            .service
            .create_ride(request(Id::new_v4()), "req-19")
            .await
            .unwrap()
            .value
            .ride;
        let second = other
            .create_ride(request(Id::new_v4()), "req-20")
            .await
            .unwrap()
            .value
            .ride;
        let third = h
            .service
            .create_ride(request(Id::new_v4()), "req-21")
            .await
            .unwrap()
            .value
            .ride;

        assert_eq!(sequence(&first), "001");
        assert_eq!(sequence(&second), "002");
        assert_eq!(sequence(&third), "003");

        h.manager.close().await;
    }

    #[tokio::test]
    async fn overlong_reason_is_a_validation_error() {
        let h = harness().await;

        let err = h
            .service
            .cancel_ride(Id::new_v4(), Id::new_v4(), Some("x".repeat(501)), "req-13")
            .await
            .unwrap_err();

        assert!(matches!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Validation(_))
        ));

        h.manager.close().await;
    }
}
