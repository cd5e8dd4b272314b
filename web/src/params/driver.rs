use domain::driver::LocationUpdate;
use domain::{coordinates, ClosedSession, DriverStatus, Id, OnlineSession, StartedRide};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct GoOnlineParams {
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct LocationParams {
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    pub(crate) speed_kmh: Option<f64>,
    pub(crate) heading_degrees: Option<f64>,
    /// Set while the driver is on a ride.
    #[schema(value_type = Option<Uuid>)]
    pub(crate) ride_id: Option<Id>,
}

impl From<LocationParams> for LocationUpdate {
    fn from(params: LocationParams) -> Self {
        LocationUpdate {
            latitude: params.latitude,
            longitude: params.longitude,
            speed_kmh: params.speed_kmh,
            heading_degrees: params.heading_degrees,
            ride_id: params.ride_id,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct StartRideParams {
    #[schema(value_type = Uuid)]
    pub(crate) ride_id: Id,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct GoOnlineResponse {
    pub(crate) status: String,
    #[schema(value_type = Uuid)]
    pub(crate) session_id: Id,
    pub(crate) message: String,
}

impl From<&OnlineSession> for GoOnlineResponse {
    fn from(online: &OnlineSession) -> Self {
        Self {
            status: DriverStatus::Available.to_string(),
            session_id: online.session.id,
            message: "You are now online and ready to accept rides".to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SessionSummary {
    pub(crate) duration_hours: f64,
    pub(crate) rides_completed: i32,
    pub(crate) earnings: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct GoOfflineResponse {
    pub(crate) status: String,
    #[schema(value_type = Uuid)]
    pub(crate) session_id: Id,
    pub(crate) session_summary: SessionSummary,
    pub(crate) message: String,
}

impl From<&ClosedSession> for GoOfflineResponse {
    fn from(closed: &ClosedSession) -> Self {
        Self {
            status: DriverStatus::Offline.to_string(),
            session_id: closed.session.id,
            session_summary: SessionSummary {
                duration_hours: closed.duration_hours,
                rides_completed: closed.rides_completed,
                earnings: closed.earnings,
            },
            message: "You are now offline".to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct LocationResponse {
    #[schema(value_type = Uuid)]
    pub(crate) coordinate_id: Id,
    /// RFC 3339
    pub(crate) updated_at: String,
}

impl From<&coordinates::Model> for LocationResponse {
    fn from(coordinate: &coordinates::Model) -> Self {
        Self {
            coordinate_id: coordinate.id,
            updated_at: coordinate.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StartRideResponse {
    #[schema(value_type = Uuid)]
    pub(crate) ride_id: Id,
    pub(crate) status: String,
    /// RFC 3339
    pub(crate) started_at: Option<String>,
    pub(crate) message: String,
}

impl From<&StartedRide> for StartRideResponse {
    fn from(started: &StartedRide) -> Self {
        Self {
            ride_id: started.ride.id,
            status: started.driver.status.to_string(),
            started_at: started.ride.started_at.map(|at| at.to_rfc3339()),
            message: "Ride started successfully".to_string(),
        }
    }
}
