use broker::{AmqpConnector, ConnectionManager, Publisher};
use domain::driver::DriverService;
use domain::fare::TariffFareEstimator;
use domain::jwt::JwtKeys;
use domain::repository::{SeaOrmDriverRepository, SeaOrmRideRepository};
use domain::ride::RideService;
use domain::rules::RideCatalog;
use log::*;
use push::{Hub, SessionConfig, SessionHandler, TokenVerifier};
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use web::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Name the broker connection shows up under in the management UI.
const CONNECTION_NAME: &str = "ride-hail";

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting Ride Hail {} ({} environment)...",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    if let Err(e) = run(config).await {
        error!("Ride Hail stopped on a fatal error: {e}");
        std::process::exit(1);
    }

    info!("Ride Hail stopped");
}

async fn run(config: Config) -> Result<(), BoxError> {
    let jwt_secret = config
        .jwt_secret()
        .ok_or("JWT_SECRET must be set to verify bearer tokens")?;
    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtKeys::new(jwt_secret));

    let db = Arc::new(service::init_database(&config).await?);

    let shutdown = CancellationToken::new();

    info!("Connecting to broker at {}", config.rabbitmq_display_url());
    let manager = Arc::new(
        ConnectionManager::new(
            config.rabbitmq_url(),
            Arc::new(AmqpConnector::new(CONNECTION_NAME)),
            &shutdown,
        )
        .with_reconnect_interval(config.reconnect_interval()),
    );
    manager.connect().await?;
    manager.declare_topology().await?;

    let hub = Arc::new(Hub::new());
    let publisher = Publisher::new(Arc::clone(&manager));

    let catalog = RideCatalog::new(&config.ride_types);
    let fares = TariffFareEstimator::standard();
    for ride_type in catalog.ride_types() {
        if !fares.has_tariff(ride_type) {
            warn!("Ride type {ride_type} has no tariff; requests for it will fail");
        }
    }

    let rides = Arc::new(RideService::new(
        Arc::new(SeaOrmRideRepository::new(Arc::clone(&db))),
        publisher.clone(),
        Arc::clone(&hub),
        catalog,
        Arc::new(fares),
    ));
    let drivers = Arc::new(DriverService::new(
        Arc::new(SeaOrmDriverRepository::new(db)),
        publisher,
        Arc::clone(&hub),
    ));
    let sessions = SessionHandler::new(hub, Arc::clone(&verifier), session_config(&config));

    let app_state = AppState::new(rides, drivers, sessions, verifier, Arc::clone(&manager));

    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn({
        let config = config.clone();
        let shutdown = shutdown.clone();
        async move { web::init_server(app_state, &config, shutdown).await }
    });

    let result = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, draining in-flight requests...");
            shutdown.cancel();
            match tokio::time::timeout(config.shutdown_grace(), &mut server).await {
                Ok(joined) => flatten(joined),
                Err(_) => {
                    warn!(
                        "Requests still in flight after {:?}, stopping anyway",
                        config.shutdown_grace()
                    );
                    server.abort();
                    Ok(())
                }
            }
        }
        joined = &mut server => {
            shutdown.cancel();
            flatten(joined)
        }
    };

    manager.close().await;
    result
}

fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        auth_timeout: Duration::from_secs(config.ws_auth_timeout_secs),
        ping_interval: Duration::from_secs(config.ws_ping_interval_secs),
        ping_timeout: Duration::from_secs(config.ws_ping_timeout_secs),
        pong_wait: Duration::from_secs(config.ws_pong_wait_secs),
    }
}

fn flatten(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), BoxError> {
    Ok(joined??)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
