//! Shopfloor API server
//!
//! Uses Postgres when `DATABASE_URL` is set and falls back to in-memory
//! stores otherwise.

use shopfloor_api::auth::{InMemoryRefreshTokenStore, RefreshTokenStore};
use shopfloor_api::clock::SystemClock;
use shopfloor_api::config::Settings;
use shopfloor_api::db::{self, PgRefreshTokenStore, PgUserStore};
use shopfloor_api::routes::create_router;
use shopfloor_api::state::AppState;
use shopfloor_api::users::{InMemoryUserStore, UserStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("Starting Shopfloor API...");

    // Load configuration
    let settings = Settings::load()?;
    info!(auth = ?settings.auth, "Configuration loaded");

    let (users, tokens): (Arc<dyn UserStore>, Arc<dyn RefreshTokenStore>) =
        match &settings.database {
            Some(database) => {
                let pool = db::init_pool(database).await?;
                db::create_tables(&pool).await?;
                (
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgRefreshTokenStore::new(pool)),
                )
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory stores (data is lost on restart)");
                (
                    Arc::new(InMemoryUserStore::new()),
                    Arc::new(InMemoryRefreshTokenStore::new()),
                )
            }
        };

    let state = Arc::new(AppState::new(
        users,
        tokens,
        Arc::new(SystemClock),
        &settings.auth,
    ));

    // Build the router
    let app = create_router(state, &settings.cors);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("Server listening on http://{}", addr);
    info!("   POST   /user_auth/token            - Login (form: username, password)");
    info!("   POST   /user_auth/refresh-token    - Rotate refresh token");
    info!("   POST   /user_auth/logout           - Revoke refresh token");
    info!("   GET    /current_user/me            - Current user profile");
    info!("   POST   /users/initialize_owner     - One-time owner bootstrap");
    info!("   POST   /users/create               - Create staff account");
    info!("   PUT    /users/edit/{{user_id}}       - Edit staff account");
    info!("   DELETE /users/delete/{{user_id}}     - Delete staff account");
    info!("   GET    /users/list                 - List staff accounts");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
///
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shopfloor_api=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
