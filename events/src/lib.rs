//! Broker wire contracts for the Ride Hail platform.
//!
//! This crate defines every payload the platform emits onto the message broker,
//! together with the exchange and routing key each payload travels on.
//!
//! # Architecture
//!
//! - **Exchanges**: two topic exchanges (`ride_topic`, `driver_topic`) and one
//!   fanout exchange (`location_fanout`).
//! - **Routed**: trait implemented by each payload so publishers never assemble
//!   routing keys by hand.
//! - **Payloads**: plain serde structs; the JSON field names are the contract
//!   consumers depend on.
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = Uuid;

/// Exchange names shared by publishers and the topology declaration.
pub mod exchange {
    pub const RIDE_TOPIC: &str = "ride_topic";
    pub const DRIVER_TOPIC: &str = "driver_topic";
    pub const LOCATION_FANOUT: &str = "location_fanout";
}

/// How long a ride request stays open for driver matching.
pub const RIDE_REQUEST_TIMEOUT_SECONDS: u32 = 30;

/// Implemented by every payload that can be published to the broker.
pub trait Routed {
    /// Name of the exchange the payload is published to.
    fn exchange(&self) -> &'static str;

    /// Routing key for the payload. Fanout payloads return an empty key.
    fn routing_key(&self) -> String;
}

/// Ride lifecycle change, keyed by ride id so consumers can bind `ride.status.*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideStatusEvent {
    pub ride_id: Id,
    pub status: String,
    pub passenger_id: Id,
    pub timestamp: DateTime<Utc>,
}

impl Routed for RideStatusEvent {
    fn exchange(&self) -> &'static str {
        exchange::RIDE_TOPIC
    }

    fn routing_key(&self) -> String {
        format!("ride.status.{}", self.ride_id)
    }
}

/// A point on the map as carried inside ride requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// New ride offered to the driver matching consumers, keyed by ride type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequestedEvent {
    pub ride_id: Id,
    pub ride_number: String,
    pub pickup_location: LocationPoint,
    pub destination_location: LocationPoint,
    pub ride_type: String,
    pub estimated_fare: f64,
    pub max_distance_km: f64,
    pub timeout_seconds: u32,
    pub correlation_id: String,
}

impl Routed for RideRequestedEvent {
    fn exchange(&self) -> &'static str {
        exchange::RIDE_TOPIC
    }

    fn routing_key(&self) -> String {
        format!("ride.request.{}", self.ride_type)
    }
}

/// Driver availability change, keyed by driver id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStatusEvent {
    pub driver_id: Id,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Id>,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
}

impl Routed for DriverStatusEvent {
    fn exchange(&self) -> &'static str {
        exchange::DRIVER_TOPIC
    }

    fn routing_key(&self) -> String {
        format!("driver.status.{}", self.driver_id)
    }
}

/// Bare coordinate pair used by location broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Driver position broadcast to every location consumer through the fanout exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdateEvent {
    pub driver_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<Id>,
    pub location: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_degrees: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Routed for LocationUpdateEvent {
    fn exchange(&self) -> &'static str {
        exchange::LOCATION_FANOUT
    }

    fn routing_key(&self) -> String {
        String::new()
    }
}
