//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (token verification, role gates, logging, compression, etc.)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id, verify_admin, verify_staff, verify_token};
use crate::routes::{auth, blogs, health, payments, requests, stats, users};
use crate::routes::{home, not_found};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if !config.enable_cors {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: landing page, health, token issuance, registration, and
///   the read-only listings (no token required)
/// - Token routes: anything acting on behalf of a signed-in user
/// - Staff routes: admins and volunteers
/// - Admin routes: user administration and blog moderation
///
/// Paths under `/users/` share the `{user}` parameter name; depending on the
/// route it carries an email or a document id.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let token = from_fn_with_state(state.clone(), verify_token);

    // Public routes (no token required)
    let public_routes = Router::new()
        .route("/", get(home))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/jwt", post(auth::issue_token))
        .route("/users", post(users::create_user))
        .route("/donors", get(users::search_donors))
        .route("/donationRequest", get(requests::list_requests))
        .route("/donationRequestCount", get(requests::count_requests))
        .route("/blogs", get(blogs::list_blogs))
        .route("/blogs/{id}", get(blogs::get_blog));

    // Routes for any signed-in user
    let token_routes = Router::new()
        .route("/metadata", get(health::server_metadata))
        .route(
            "/users/{user}",
            get(users::get_user).put(users::update_profile),
        )
        .route("/users/role/{user}", get(users::get_role))
        .route("/users/admin/{user}", get(users::check_admin))
        .route("/donationRequest", post(requests::create_request))
        .route(
            "/donationRequest/{id}",
            get(requests::get_request)
                .put(requests::update_request)
                .delete(requests::delete_request),
        )
        .route("/donationRequest/{id}/status", patch(requests::set_status))
        .route(
            "/create-payment-intent",
            post(payments::create_payment_intent),
        )
        .route(
            "/funds",
            get(payments::list_funds).post(payments::record_fund),
        )
        .route_layer(token.clone());

    // Admins and volunteers
    let staff_routes = Router::new()
        .route("/blogs", post(blogs::create_blog))
        .route("/admin-stats", get(stats::admin_stats))
        .route_layer(from_fn_with_state(state.clone(), verify_staff))
        .route_layer(token.clone());

    // Admins only
    let admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{user}/role", patch(users::set_role))
        .route("/users/{user}/status", patch(users::set_status))
        .route("/blogs/{id}", delete(blogs::delete_blog))
        .route("/blogs/{id}/status", patch(blogs::set_status))
        .route_layer(from_fn_with_state(state.clone(), verify_admin))
        .route_layer(token);

    // Combine routes
    Router::new()
        .merge(public_routes)
        .merge(token_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.timeout_secs),
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Life Drops HTTP server
///
/// Initializes the server with the provided configuration and starts listening
/// for incoming HTTP requests. This function will block until the server is
/// shut down via SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
///
/// # Initialization
///
/// 1. Sets up structured JSON logging with the configured log level
/// 2. Installs the Prometheus recorder when metrics are enabled
/// 3. Connects to the database and pings it
/// 4. Builds the Axum router with all routes and middleware
/// 5. Binds to the configured TCP address and serves until a shutdown signal
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    if config.auth.generated_secret {
        tracing::warn!(
            "No access token secret configured, using a random one; tokens will not survive a restart"
        );
    }

    let mut state = ServerState::new(config.clone()).await?;
    if config.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        state = state.with_metrics(handle);
    }

    // A failed ping is logged, not fatal; `/ready` keeps reporting it.
    match state.store.ping().await {
        Ok(()) => tracing::info!("Pinged your deployment. You successfully connected to the database!"),
        Err(e) => tracing::error!(error = %e, "database ping failed"),
    }

    let app = build_router(Arc::new(state));

    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        "Starting Life Drops server on {} with {:?} database backend",
        addr,
        config.database.backend
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        config.enable_cors,
        config.metrics_enabled
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
