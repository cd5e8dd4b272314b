//! HTTP and WebSocket surface of the Ride Hail service.

use axum::http::{header, HeaderName, HeaderValue, Method};
use broker::ConnectionManager;
use domain::driver::DriverService;
use domain::ride::RideService;
use log::*;
use push::{SessionHandler, TokenVerifier};
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub use error::{Error, Result};

mod controller;
mod error;
mod extractors;
mod middleware;
mod params;
mod router;
mod ws;

/// Everything a handler may reach. Cheap to clone: every member is shared.
#[derive(Clone)]
pub struct AppState {
    pub rides: Arc<RideService>,
    pub drivers: Arc<DriverService>,
    pub sessions: SessionHandler,
    pub verifier: Arc<dyn TokenVerifier>,
    pub broker: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(
        rides: Arc<RideService>,
        drivers: Arc<DriverService>,
        sessions: SessionHandler,
        verifier: Arc<dyn TokenVerifier>,
        broker: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            rides,
            drivers,
            sessions,
            verifier,
            broker,
        }
    }
}

/// Serves the API until `shutdown` is cancelled, then drains in-flight
/// requests before returning.
pub async fn init_server(
    app_state: AppState,
    config: &Config,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let host = config.interface.as_deref().unwrap_or("127.0.0.1");
    let listen_addr = format!("{host}:{}", config.port);

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Server starting... listening for connections on http://{listen_addr}");

    let app = router::define_routes(app_state).layer(cors_layer(&config.allowed_origins));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed CORS origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_credentials(true)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::request_id::REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(
            middleware::request_id::REQUEST_ID_HEADER,
        )])
        .allow_origin(origins)
}
