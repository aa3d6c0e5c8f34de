use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session verification and the perimeter guard.
pub mod auth;
pub mod guard;

// Upstream access: the backend contract, its HTTP client and the in-memory stand-in.
pub mod backend;
pub mod memory;

// Resource panels: registry, form validation, caching and the panel state machine.
pub mod cache;
pub mod entities;
pub mod panel;
pub mod schema;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

pub mod routes;
use routes::{admin, panels, public};

// --- Public Re-exports ---

pub use backend::{Backend, BackendState, HttpBackend};
pub use cache::{MutationTracker, QueryCache};
pub use config::AppConfig;
pub use error::AppError;
pub use memory::MemoryBackend;

/// ApiDoc
///
/// Generates the OpenAPI document for every dashboard endpoint. Served at
/// `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login, handlers::logout, handlers::dashboard,
        handlers::payments, handlers::list_users, handlers::user_detail,
        handlers::update_profile, handlers::change_password, handlers::list_panel,
        handlers::create_panel_record, handlers::update_panel_record,
        handlers::delete_panel_record
    ),
    components(
        schemas(
            models::Record, models::Pagination, models::Toast, models::ToastKind,
            models::UserSummary, models::DashboardOverview, models::TotalRevenue,
            models::MonthlyRevenue, models::PaymentStatus, models::PaymentRecord,
            models::LoginRequest, models::PanelStatus, models::FieldDescriptor,
            models::PanelView, models::UsersView, models::TabDescriptor,
            models::UserDetailView, models::ProfileResponse, models::DashboardView,
            models::PaymentsView, models::ActionResponse, models::LoginResponse,
        )
    ),
    tags(
        (name = "pitchside-admin", description = "Player management dashboard API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container shared by every request: the backend handle, the list cache, the
/// per-panel mutation slots and the configuration. Cloning is cheap; everything mutable
/// sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Upstream REST backend (HTTP in production, in-memory in tests).
    pub backend: BackendState,
    pub cache: Arc<QueryCache>,
    pub mutations: Arc<MutationTracker>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(backend: BackendState, config: AppConfig) -> Self {
        Self {
            backend,
            cache: Arc::new(QueryCache::with_fetch_window(
                Duration::from_secs(config.cache_ttl_secs),
                Duration::from_secs(config.request_timeout_secs),
            )),
            mutations: Arc::new(MutationTracker::new()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for BackendState {
    fn from_ref(app_state: &AppState) -> BackendState {
        app_state.backend.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route, wraps the whole tree in the access guard and adds the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(admin::admin_routes())
        .merge(panels::panel_routes())
        // The guard runs for every request, matched or not, so unknown paths outside the
        // allow-list redirect to /login instead of answering 404.
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            guard::access_guard,
        ))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
