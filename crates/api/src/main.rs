use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use domain::services::{SensorSource, StaticSensorSource};
use lifeguard_api::app::{create_app, AppDeps};
use lifeguard_api::config::Config;
use lifeguard_api::middleware;
use lifeguard_api::services::FirebaseSensorSource;
use persistence::repositories::{HealthReportRepository, UserRepository};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting LifeGuard API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&(&config.database).into())
        .await
        .context("Failed to connect to database")?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let sensors: Arc<dyn SensorSource> = if config.firebase.enabled {
        Arc::new(FirebaseSensorSource::new(&config.firebase)?)
    } else {
        warn!("Firebase disabled; health reports will find no sensor data");
        Arc::new(StaticSensorSource::new())
    };

    let deps = AppDeps {
        pool: Some(pool.clone()),
        users: Arc::new(UserRepository::new(pool.clone())),
        reports: Arc::new(HealthReportRepository::new(pool)),
        sensors,
    };

    let addr = config.socket_addr()?;
    let app = create_app(config, deps)?;

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
