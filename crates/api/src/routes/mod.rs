pub mod auditorium;
pub mod auth;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                     register (public)
/// /auth/login                        login (public)
///
/// /users/me                          current user (requires auth)
///
/// /auditoriums/status                stored state of every room (public)
/// /auditoriums/lock                  lock a room (POST, requires auth)
/// /auditoriums/unlock                unlock a room (POST, requires auth)
/// /auditoriums/configure             apply a firewall class (POST, requires auth)
/// /auditoriums/pending               live scheduled unlocks (requires auth)
/// /auditoriums/check_and_restore     reconciliation sweep (POST, requires auth)
/// /auditoriums/check_network         live network state of one room (POST, requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/auditoriums", auditorium::router())
}
