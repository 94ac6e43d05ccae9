use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{HealthReportService, HealthReportStore, SensorSource, UserStore};
use shared::jwt::{JwtConfig, JwtError};
use shared::secret_box::{SecretBox, SecretBoxError};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, require_user_auth, security_headers_middleware, trace_id,
};
use crate::routes::{account, health, health_report, profile, reports, root};
use crate::services::{AuthService, EmailService, OtpService, PdfRenderer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Present when backed by Postgres; used for pool metrics
    pub pool: Option<PgPool>,
    pub users: Arc<dyn UserStore>,
    pub reports: Arc<dyn HealthReportStore>,
    pub report_service: HealthReportService,
    pub auth: AuthService,
    pub jwt: Arc<JwtConfig>,
    pub pdf: PdfRenderer,
}

/// Errors raised while assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),

    #[error("Invalid OTP secret key: {0}")]
    SecretKey(#[from] SecretBoxError),
}

/// External systems the application talks to.
pub struct AppDeps {
    pub pool: Option<PgPool>,
    pub users: Arc<dyn UserStore>,
    pub reports: Arc<dyn HealthReportStore>,
    pub sensors: Arc<dyn SensorSource>,
}

impl AppState {
    pub fn new(config: Config, deps: AppDeps) -> Result<Self, StartupError> {
        let jwt = Arc::new(JwtConfig::new(
            &config.jwt.secret,
            &config.jwt.issuer,
            &config.jwt.audience,
            config.jwt.expiry_minutes,
            config.jwt.leeway_secs,
        )?);

        let email = EmailService::new(config.email.clone());
        let mut otp = OtpService::new(&config.otp, email.clone());
        if config.otp.secret_key.is_empty() {
            tracing::warn!("otp.secret_key not set; OTP secrets are stored unencrypted");
        } else {
            otp = otp.with_sealer(SecretBox::from_base64_key(&config.otp.secret_key)?);
        }
        let auth = AuthService::new(
            deps.users.clone(),
            jwt.clone(),
            otp,
            email,
            &config.auth,
        );

        let report_service = HealthReportService::new(deps.sensors).with_deadline(
            Duration::from_millis(config.reports.generation_timeout_ms),
        );

        Ok(Self {
            pdf: PdfRenderer::new(&config.reports),
            config: Arc::new(config),
            pool: deps.pool,
            users: deps.users,
            reports: deps.reports,
            report_service,
            auth,
            jwt,
        })
    }
}

pub fn create_app(config: Config, deps: AppDeps) -> Result<Router, StartupError> {
    let state = AppState::new(config, deps)?;
    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Routes requiring a user JWT
    let protected_routes = Router::new()
        .route(
            "/api/Reports",
            post(reports::create_report).get(reports::list_reports),
        )
        .route("/api/Reports/:id", delete(reports::delete_report))
        .route(
            "/api/Profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let account_routes = Router::new()
        .route("/api/Account/register", post(account::register))
        .route("/api/Account/login", post(account::login))
        .route("/api/Account/ResendOTP", post(account::resend_otp))
        .route("/api/Account/VerifyOTP", post(account::verify_otp))
        .route("/api/Account/ResetPassword", post(account::reset_password))
        .route("/api/Account/forgot-password", post(account::forgot_password))
        .route("/api/Account/id", get(account::get_user_by_id));

    let report_routes = Router::new()
        .route("/api/HealthReport", get(health_report::get_health_report))
        .route(
            "/api/HealthReport/:device_id/pdf",
            get(health_report::get_health_report_pdf),
        );

    let public_routes = Router::new()
        .route("/", get(root::welcome))
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(report_routes)
        .merge(protected_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
