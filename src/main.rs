use pitchside_admin::{
    AppState, BackendState, HttpBackend, MemoryBackend,
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Setting `BACKEND_URL` to this value in `Local` runs the dashboard against the in-memory
/// backend.
const MEMORY_BACKEND: &str = "memory";

/// main
///
/// Loads configuration, initialises logging, picks the backend and serves the dashboard.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pitchside_admin=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Backend Selection
    let use_memory = config.env == Env::Local && config.backend_url == MEMORY_BACKEND;
    let backend: BackendState = if use_memory {
        tracing::warn!("BACKEND_URL=memory: nothing is persisted across restarts");
        Arc::new(MemoryBackend::new())
    } else {
        let client =
            HttpBackend::new(&config).expect("FATAL: Failed to build the backend HTTP client.");
        tracing::info!(
            backend = %config.backend_url,
            auth = %config.auth_url,
            "backend client ready"
        );
        Arc::new(client)
    };

    // 5. Router and Server Startup
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(backend, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the listen address. Check BIND_ADDR.");

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
