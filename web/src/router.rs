use crate::controller::{driver_controller, health_check_controller, ride_controller};
use crate::middleware::request_id::ensure_request_id;
use crate::ws::handler as ws_handler;
use crate::{params, AppState};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Ride Hail API"
        ),
        paths(
            health_check_controller::health_check,
            ride_controller::create,
            ride_controller::cancel,
            driver_controller::online,
            driver_controller::offline,
            driver_controller::location,
            driver_controller::start,
        ),
        components(
            schemas(
                params::ride::CreateRideParams,
                params::ride::CancelRideParams,
                params::ride::RideCreatedResponse,
                params::ride::RideCancelledResponse,
                params::driver::GoOnlineParams,
                params::driver::LocationParams,
                params::driver::GoOnlineResponse,
                params::driver::GoOfflineResponse,
                params::driver::SessionSummary,
                params::driver::LocationResponse,
                params::driver::StartRideParams,
                params::driver::StartRideResponse,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "ride_hail", description = "Ride requests, driver sessions and live location")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Passengers and drivers authenticate every REST call with a bearer JWT.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Passenger or driver token"))
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(ride_routes(app_state.clone()))
        .merge(driver_routes(app_state.clone()))
        .merge(push_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(from_fn(ensure_request_id))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn ride_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/rides", post(ride_controller::create))
        .route("/rides/{ride_id}/cancel", post(ride_controller::cancel))
        .with_state(app_state)
}

fn driver_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/drivers/{driver_id}/online",
            post(driver_controller::online),
        )
        .route(
            "/drivers/{driver_id}/offline",
            post(driver_controller::offline),
        )
        .route(
            "/drivers/{driver_id}/location",
            post(driver_controller::location),
        )
        .route("/drivers/{driver_id}/start", post(driver_controller::start))
        .with_state(app_state)
}

fn push_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws/passengers/{passenger_id}", get(ws_handler::passenger_ws))
        .route("/ws/drivers/{driver_id}", get(ws_handler::driver_ws))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::request_id::REQUEST_ID_HEADER;
    use crate::test_support::TestApp;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use domain::Id;
    use push::{testing, ActorId};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post_json(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, bearer);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> Response {
        define_routes(app.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ride_body() -> Value {
        json!({
            "pickup_latitude": 43.238949,
            "pickup_longitude": 76.889709,
            "pickup_address": "Almaty Central Park",
            "destination_latitude": 43.222015,
            "destination_longitude": 76.851511,
            "destination_address": "Kok-Tobe Hill",
            "ride_type": "economy"
        })
    }

    #[tokio::test]
    async fn health_reports_the_broker_link() {
        let app = TestApp::new().await;
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "healthy", "broker": "connected"})
        );
    }

    #[tokio::test]
    async fn health_degrades_once_the_broker_is_closed() {
        let app = TestApp::new().await;
        app.manager.close().await;
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "degraded");
    }

    #[tokio::test]
    async fn create_ride_requires_a_bearer_token() {
        let app = TestApp::new().await;

        let response = send(&app, post_json("/rides", None, ride_body())).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = json_body(response).await;
        assert_eq!(body["error"], "missing bearer token");
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn create_ride_rejects_a_forged_token() {
        let app = TestApp::new().await;

        let response = send(
            &app,
            post_json("/rides", Some("Bearer not.a.jwt"), ride_body()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid token");
    }

    #[tokio::test]
    async fn create_ride_rejects_driver_tokens() {
        let app = TestApp::new().await;
        let bearer = app.bearer(&ActorId::driver(Id::new_v4().to_string()));

        let response = send(&app, post_json("/rides", Some(bearer.as_str()), ride_body())).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_ride_persists_publishes_and_notifies() {
        let app = TestApp::new().await;
        let passenger_id = Id::new_v4();
        let passenger = ActorId::passenger(passenger_id.to_string());
        let mut client = testing::attach(&app.hub, passenger.clone());
        let bearer = app.bearer(&passenger);

        let mut request = post_json("/rides", Some(bearer.as_str()), ride_body());
        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER, "req-create-1".parse().unwrap());
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-create-1");
        let body = json_body(response).await;
        assert_eq!(body["status_code"], 201);
        assert!(body.get("warnings").is_none());
        assert_eq!(body["data"]["status"], "REQUESTED");
        assert!(body["data"]["ride_number"]
            .as_str()
            .unwrap()
            .starts_with("RIDE_"));

        let ride_id: Id = serde_json::from_value(body["data"]["ride_id"].clone()).unwrap();
        let stored = app.rides.get(ride_id).unwrap();
        assert_eq!(stored.passenger_id, passenger_id);
        assert_eq!(stored.vehicle_type, "ECONOMY");

        let published = app.broker.published();
        let keys: Vec<_> = published.iter().map(|m| m.routing_key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                format!("ride.status.{ride_id}").as_str(),
                "ride.request.ECONOMY"
            ]
        );
        assert!(published
            .iter()
            .all(|m| m.properties.correlation_id.as_deref() == Some("req-create-1")));

        let frames = client.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "ride_update");
    }

    #[tokio::test]
    async fn create_ride_without_a_connected_passenger_warns() {
        let app = TestApp::new().await;
        let bearer = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));

        let response = send(&app, post_json("/rides", Some(bearer.as_str()), ride_body())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["warnings"][0]["kind"], "notification_failed");
    }

    #[tokio::test]
    async fn create_ride_answers_accepted_when_events_are_lost() {
        let app = TestApp::new().await;
        app.broker.fail_publishes(true);
        let bearer = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));

        let response = send(&app, post_json("/rides", Some(bearer.as_str()), ride_body())).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        let kinds: Vec<_> = body["warnings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["kind"].as_str().unwrap().to_string())
            .collect();
        assert!(kinds.contains(&"publish_failed".to_string()));
        assert_eq!(app.rides.len(), 1);
    }

    #[tokio::test]
    async fn create_ride_rejects_unknown_ride_types() {
        let app = TestApp::new().await;
        let bearer = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));
        let mut body = ride_body();
        body["ride_type"] = json!("helicopter");

        let response = send(&app, post_json("/rides", Some(bearer.as_str()), body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "validation_error");
        assert!(app.rides.is_empty());
        assert!(app.broker.published().is_empty());
    }

    #[tokio::test]
    async fn cancel_ride_then_cancel_again_conflicts() {
        let app = TestApp::new().await;
        let bearer = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));
        let created = json_body(send(&app, post_json("/rides", Some(bearer.as_str()), ride_body())).await).await;
        let ride_id = created["data"]["ride_id"].as_str().unwrap().to_string();
        let uri = format!("/rides/{ride_id}/cancel");

        let response = send(
            &app,
            post_json(&uri, Some(bearer.as_str()), json!({"reason": "  changed plans  "})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["status"], "CANCELLED");
        assert!(body["data"]["cancelled_at"].is_string());
        let stored = app.rides.get(ride_id.parse().unwrap()).unwrap();
        assert_eq!(stored.cancellation_reason.as_deref(), Some("changed plans"));

        let again = send(&app, post_json(&uri, Some(bearer.as_str()), json!({}))).await;
        assert_eq!(again.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancel_ride_of_another_passenger_conflicts() {
        let app = TestApp::new().await;
        let owner = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));
        let stranger = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));
        let created = json_body(send(&app, post_json("/rides", Some(owner.as_str()), ride_body())).await).await;
        let uri = format!(
            "/rides/{}/cancel",
            created["data"]["ride_id"].as_str().unwrap()
        );

        let response = send(&app, post_json(&uri, Some(stranger.as_str()), json!({}))).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancel_ride_accepts_an_empty_body() {
        let app = TestApp::new().await;
        let bearer = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));
        let created = json_body(send(&app, post_json("/rides", Some(bearer.as_str()), ride_body())).await).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!(
                "/rides/{}/cancel",
                created["data"]["ride_id"].as_str().unwrap()
            ))
            .header(header::AUTHORIZATION, &bearer)
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn drivers_may_only_act_on_themselves() {
        let app = TestApp::new().await;
        let driver_id = Id::new_v4();
        app.drivers.add_driver(driver_id);
        let other = app.bearer(&ActorId::driver(Id::new_v4().to_string()));

        let response = send(
            &app,
            post_json(
                &format!("/drivers/{driver_id}/online"),
                Some(other.as_str()),
                json!({"latitude": 43.238949, "longitude": 76.889709}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.drivers.status(driver_id), Some(domain::DriverStatus::Offline));
    }

    #[tokio::test]
    async fn passenger_tokens_cannot_drive() {
        let app = TestApp::new().await;
        let id = Id::new_v4();
        app.drivers.add_driver(id);
        let bearer = app.bearer(&ActorId::passenger(id.to_string()));

        let response = send(
            &app,
            post_json(&format!("/drivers/{id}/offline"), Some(bearer.as_str()), json!({})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn driver_session_lifecycle() {
        let app = TestApp::new().await;
        let driver_id = Id::new_v4();
        app.drivers.add_driver(driver_id);
        let driver = ActorId::driver(driver_id.to_string());
        let mut client = testing::attach(&app.hub, driver.clone());
        let bearer = app.bearer(&driver);
        let online_uri = format!("/drivers/{driver_id}/online");
        let position = json!({"latitude": 43.238949, "longitude": 76.889709});

        let online = send(&app, post_json(&online_uri, Some(bearer.as_str()), position.clone())).await;
        assert_eq!(online.status(), StatusCode::OK);
        let online = json_body(online).await;
        assert_eq!(online["data"]["status"], "AVAILABLE");
        let session_id = online["data"]["session_id"].clone();

        let twice = send(&app, post_json(&online_uri, Some(bearer.as_str()), position)).await;
        assert_eq!(twice.status(), StatusCode::CONFLICT);

        let location = send(
            &app,
            post_json(
                &format!("/drivers/{driver_id}/location"),
                Some(bearer.as_str()),
                json!({
                    "latitude": 43.240,
                    "longitude": 76.890,
                    "speed_kmh": 42.0,
                    "heading_degrees": 180.0
                }),
            ),
        )
        .await;
        assert_eq!(location.status(), StatusCode::OK);
        let location = json_body(location).await;
        assert_eq!(
            location["data"]["coordinate_id"],
            json!(app.drivers.current_location(driver_id).unwrap().id)
        );

        let offline = send(
            &app,
            post_json(&format!("/drivers/{driver_id}/offline"), Some(bearer.as_str()), json!({})),
        )
        .await;
        assert_eq!(offline.status(), StatusCode::OK);
        let offline = json_body(offline).await;
        assert_eq!(offline["data"]["session_id"], session_id);
        assert_eq!(offline["data"]["session_summary"]["rides_completed"], 0);

        let exchanges: Vec<_> = app
            .broker
            .published()
            .into_iter()
            .map(|m| m.exchange)
            .collect();
        assert_eq!(
            exchanges,
            vec!["driver_topic", "location_fanout", "driver_topic"]
        );

        let statuses: Vec<_> = client
            .frames()
            .into_iter()
            .map(|f| f["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(statuses, vec!["status_update", "status_update"]);
    }

    #[tokio::test]
    async fn driver_starts_a_requested_ride() {
        let app = TestApp::new().await;
        let passenger = app.bearer(&ActorId::passenger(Id::new_v4().to_string()));
        let created = json_body(send(&app, post_json("/rides", Some(passenger.as_str()), ride_body())).await).await;
        let ride_id = created["data"]["ride_id"].clone();

        let driver_id = Id::new_v4();
        app.drivers.add_driver(driver_id);
        let bearer = app.bearer(&ActorId::driver(driver_id.to_string()));
        let online = send(
            &app,
            post_json(
                &format!("/drivers/{driver_id}/online"),
                Some(bearer.as_str()),
                json!({"latitude": 43.238949, "longitude": 76.889709}),
            ),
        )
        .await;
        assert_eq!(online.status(), StatusCode::OK);

        let start_uri = format!("/drivers/{driver_id}/start");
        let response = send(
            &app,
            post_json(&start_uri, Some(bearer.as_str()), json!({"ride_id": ride_id})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["ride_id"], ride_id);
        assert_eq!(body["data"]["status"], "BUSY");
        assert_eq!(body["data"]["message"], "Ride started successfully");
        assert!(body["data"]["started_at"].is_string());
        let stored = app
            .rides
            .get(ride_id.as_str().unwrap().parse().unwrap())
            .unwrap();
        assert_eq!(stored.status, domain::RideStatus::InProgress);
        assert_eq!(stored.driver_id, Some(driver_id));

        let again = send(
            &app,
            post_json(&start_uri, Some(bearer.as_str()), json!({"ride_id": ride_id})),
        )
        .await;
        assert_eq!(again.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn starting_an_unknown_ride_is_not_found() {
        let app = TestApp::new().await;
        let driver_id = Id::new_v4();
        app.drivers.add_driver(driver_id);
        let bearer = app.bearer(&ActorId::driver(driver_id.to_string()));
        send(
            &app,
            post_json(
                &format!("/drivers/{driver_id}/online"),
                Some(bearer.as_str()),
                json!({"latitude": 43.238949, "longitude": 76.889709}),
            ),
        )
        .await;

        let response = send(
            &app,
            post_json(
                &format!("/drivers/{driver_id}/start"),
                Some(bearer.as_str()),
                json!({"ride_id": Id::new_v4()}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn location_updates_from_offline_drivers_conflict() {
        let app = TestApp::new().await;
        let driver_id = Id::new_v4();
        app.drivers.add_driver(driver_id);
        let bearer = app.bearer(&ActorId::driver(driver_id.to_string()));

        let response = send(
            &app,
            post_json(
                &format!("/drivers/{driver_id}/location"),
                Some(bearer.as_str()),
                json!({"latitude": 43.24, "longitude": 76.89}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(app.broker.published().is_empty());
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = TestApp::new().await;
        let request = Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/rides/{ride_id}/cancel"].is_object());
        assert!(doc["paths"]["/drivers/{driver_id}/start"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
