//! Route definitions for the `/auditoriums` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auditorium;
use crate::state::AppState;

/// Routes mounted at `/auditoriums`.
///
/// ```text
/// GET  /status             -> status
/// GET  /pending            -> pending (requires auth)
/// POST /lock               -> lock (requires auth)
/// POST /unlock             -> unlock (requires auth)
/// POST /configure          -> configure (requires auth)
/// POST /check_and_restore  -> check_and_restore (requires auth)
/// POST /check_network      -> check_network (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(auditorium::status))
        .route("/pending", get(auditorium::pending))
        .route("/lock", post(auditorium::lock))
        .route("/unlock", post(auditorium::unlock))
        .route("/configure", post(auditorium::configure))
        .route("/check_and_restore", post(auditorium::check_and_restore))
        .route("/check_network", post(auditorium::check_network))
}
