use crate::{AppState, handlers};
use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

/// Admin Router Module
///
/// The dashboard screens. Every handler takes a `Session`, which the access guard has
/// already verified to carry the admin role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // The dashboard has no landing page of its own.
        .route("/", get(|| async { Redirect::to(handlers::HOME_PATH) }))
        // GET /dashboard?year=...
        // Overview counters and the monthly revenue chart.
        .route("/dashboard", get(handlers::dashboard))
        // GET /user-management?page=...&limit=...&search=...
        .route("/user-management", get(handlers::list_users))
        // GET /user-management/{id}?tab=...&page=...
        // Profile, tab list and the active tab's panel.
        // PUT /user-management/{id}
        // Profile edit.
        .route(
            "/user-management/{id}",
            get(handlers::user_detail).put(handlers::update_profile),
        )
        // GET /payments?page=...&year=...
        .route("/payments", get(handlers::payments))
        // POST /change-password
        .route("/change-password", post(handlers::change_password))
}
