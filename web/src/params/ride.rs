use domain::fare::FareQuote;
use domain::ride::RideRequest;
use domain::{rides, Id};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /rides`. The passenger is taken from the bearer token.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct CreateRideParams {
    pub(crate) pickup_latitude: f64,
    pub(crate) pickup_longitude: f64,
    pub(crate) pickup_address: String,
    pub(crate) destination_latitude: f64,
    pub(crate) destination_longitude: f64,
    pub(crate) destination_address: String,
    #[schema(example = "ECONOMY")]
    pub(crate) ride_type: String,
}

impl CreateRideParams {
    pub(crate) fn into_request(self, passenger_id: Id) -> RideRequest {
        RideRequest {
            passenger_id,
            pickup_latitude: self.pickup_latitude,
            pickup_longitude: self.pickup_longitude,
            pickup_address: self.pickup_address,
            destination_latitude: self.destination_latitude,
            destination_longitude: self.destination_longitude,
            destination_address: self.destination_address,
            ride_type: self.ride_type,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct CancelRideParams {
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct RideCreatedResponse {
    #[schema(value_type = Uuid)]
    pub(crate) ride_id: Id,
    pub(crate) ride_number: String,
    pub(crate) status: String,
    pub(crate) estimated_fare: f64,
    pub(crate) estimated_duration_minutes: u32,
    pub(crate) estimated_distance_km: f64,
}

impl RideCreatedResponse {
    pub(crate) fn new(ride: &rides::Model, quote: &FareQuote) -> Self {
        Self {
            ride_id: ride.id,
            ride_number: ride.ride_number.clone(),
            status: ride.status.to_string(),
            estimated_fare: quote.fare,
            estimated_duration_minutes: quote.duration_minutes,
            estimated_distance_km: quote.distance_km,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct RideCancelledResponse {
    #[schema(value_type = Uuid)]
    pub(crate) ride_id: Id,
    pub(crate) status: String,
    /// RFC 3339
    pub(crate) cancelled_at: Option<String>,
    pub(crate) message: String,
}

impl From<&rides::Model> for RideCancelledResponse {
    fn from(ride: &rides::Model) -> Self {
        Self {
            ride_id: ride.id,
            status: ride.status.to_string(),
            cancelled_at: ride.cancelled_at.map(|at| at.to_rfc3339()),
            message: "Ride cancelled successfully".to_string(),
        }
    }
}
