use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Panel Router Module
///
/// One set of CRUD routes serves every entity in the registry; `{entity}` is resolved to
/// an `EntityKind` in the handler and unknown keys answer `404`.
pub fn panel_routes() -> Router<AppState> {
    Router::new()
        // GET  /panels/{entity}/{owner_id}?page=...&limit=...
        // POST /panels/{entity}/{owner_id}   (JSON or multipart)
        .route(
            "/panels/{entity}/{owner_id}",
            get(handlers::list_panel).post(handlers::create_panel_record),
        )
        // PUT    /panels/{entity}/{owner_id}/{record_id}
        // DELETE /panels/{entity}/{owner_id}/{record_id}?confirm=true
        .route(
            "/panels/{entity}/{owner_id}/{record_id}",
            put(handlers::update_panel_record).delete(handlers::delete_panel_record),
        )
}
