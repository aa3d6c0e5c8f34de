use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Public Router Module
///
/// Endpoints reachable without a session. Every path here must also be covered by the
/// guard's public prefixes, otherwise an anonymous caller would be redirected away from
/// the very screen that lets them sign in.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /login shows the form; an existing admin session skips it.
        // POST /login proxies credentials to the identity provider and sets the cookie.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET|POST /logout
        // Clears the session cookie and returns to /login.
        .route("/logout", get(handlers::logout).post(handlers::logout))
}
