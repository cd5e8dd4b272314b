use axum::http::StatusCode;
use axum::Json;
use domain::outcome::{Degradation, DegradationKind, Outcome};
use serde::Serialize;

pub(crate) mod driver_controller;
pub(crate) mod health_check_controller;
pub(crate) mod ride_controller;

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    /// Side effects that failed after the change was committed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Degradation>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
            warnings: Vec::new(),
        }
    }

    fn with_warnings(mut self, warnings: Vec<Degradation>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Turns a use case outcome into the HTTP reply. An unpublished event
/// downgrades the reply to `202 Accepted`; a missed push keeps `success`.
fn respond<T: Serialize>(
    success: StatusCode,
    outcome: Outcome<T>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match outcome.severity() {
        Some(DegradationKind::PublishFailed) => StatusCode::ACCEPTED,
        _ => success,
    };
    let (data, warnings) = outcome.into_parts();
    (
        status,
        Json(ApiResponse::new(status.into(), data).with_warnings(warnings)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_api_response_without_warnings() {
        let response = ApiResponse::new(StatusCode::OK.into(), 23);
        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized, json!({"data": 23, "status_code": 200}));
    }

    #[test]
    fn clean_outcome_keeps_the_success_status() {
        let (status, Json(body)) = respond(StatusCode::CREATED, Outcome::new("ok"));
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.warnings.is_empty());
    }

    #[test]
    fn failed_push_keeps_the_success_status_but_warns() {
        let mut outcome = Outcome::new("ok");
        outcome.degrade(
            DegradationKind::NotificationFailed,
            "ride update was not delivered",
        );

        let (status, Json(body)) = respond(StatusCode::OK, outcome);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(&body).unwrap()["warnings"],
            json!([{"kind": "notification_failed", "detail": "ride update was not delivered"}])
        );
    }

    #[test]
    fn failed_publish_downgrades_to_accepted() {
        let mut outcome = Outcome::new("ok");
        outcome.degrade(
            DegradationKind::NotificationFailed,
            "ride update was not delivered",
        );
        outcome.degrade(
            DegradationKind::PublishFailed,
            "ride status was not published",
        );

        let (status, Json(body)) = respond(StatusCode::CREATED, outcome);

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.status_code, 202);
        assert_eq!(body.warnings.len(), 2);
    }
}
