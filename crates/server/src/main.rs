//! Grievance server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use grievance_api::{middleware::AppState, router as api_router};
use grievance_common::Config;
use grievance_core::services::{
    ComplaintService, EscalationService, NotificationService, UserService,
};
use grievance_db::repositories::{
    ComplaintRepository, HistoryRepository, NotificationRepository, UserRepository,
};
use grievance_scheduler::{SchedulerConfig, run_scheduler};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grievance=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting grievance server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = grievance_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    grievance_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let complaint_repo = ComplaintRepository::new(Arc::clone(&db));
    let history_repo = HistoryRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    // Initialize services
    let user_service = UserService::new(user_repo.clone());
    let notification_service = NotificationService::new(notification_repo, user_repo.clone());
    let complaint_service = ComplaintService::new(
        complaint_repo.clone(),
        history_repo,
        user_repo,
        notification_service.clone(),
        config.workflow.hod_response_days,
    );
    let escalation_service = EscalationService::new(complaint_repo, complaint_service.clone());

    // Start the escalation sweep
    run_scheduler(
        SchedulerConfig::from_minutes(config.workflow.sweep_interval_minutes),
        Arc::new(escalation_service),
    )
    .await;
    info!(
        interval_minutes = config.workflow.sweep_interval_minutes,
        "Escalation sweep scheduled"
    );

    // Create app state
    let state = AppState {
        user_service,
        complaint_service,
        notification_service,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            grievance_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
