//! Handlers for the `/auditoriums` resource.
//!
//! Mutating operations run inside a spawned task that the handler awaits.
//! If the request is dropped (timeout, client disconnect) the operation
//! still runs to completion, so the store never diverges from the network.

use std::future::Future;

use audnet_access::{AccessError, PendingUnlock};
use audnet_core::access::DEFAULT_LOCK_MINUTES;
use audnet_core::types::{RoomNumber, Timestamp};
use audnet_db::models::room_access::RoomAccessRecord;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auditoriums/lock`.
#[derive(Debug, Deserialize)]
pub struct LockRequest {
    #[serde(alias = "number")]
    pub room_number: RoomNumber,
    #[serde(default = "default_lock_minutes", alias = "duration")]
    pub duration_minutes: i64,
    /// Free-form note, logged only.
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_lock_minutes() -> i64 {
    DEFAULT_LOCK_MINUTES
}

/// Request body for `POST /auditoriums/unlock`.
#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    #[serde(alias = "number")]
    pub room_number: RoomNumber,
}

/// Request body for `POST /auditoriums/configure`.
#[derive(Debug, Deserialize)]
pub struct ConfigureRequest {
    #[serde(alias = "number")]
    pub room_number: RoomNumber,
    pub class_number: i64,
    pub state: String,
}

/// Request body for `POST /auditoriums/check_network`.
#[derive(Debug, Deserialize)]
pub struct CheckNetworkRequest {
    #[serde(alias = "number")]
    pub room_number: RoomNumber,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LockResponse {
    pub message: String,
    pub unlock_time: Option<Timestamp>,
}

/// One row of `GET /auditoriums/status`.
#[derive(Debug, Serialize)]
pub struct RoomStatus {
    pub room_number: RoomNumber,
    pub is_network_on: bool,
    pub unlock_time: Option<Timestamp>,
}

impl From<RoomAccessRecord> for RoomStatus {
    fn from(record: RoomAccessRecord) -> Self {
        Self {
            room_number: record.room_number,
            is_network_on: record.is_network_on,
            unlock_time: record.unlock_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckNetworkResponse {
    pub message: String,
    /// Raw output of the status action.
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub message: String,
    pub restored_rooms: Vec<RoomNumber>,
    pub failed_rooms: Vec<RoomNumber>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auditoriums/lock
pub async fn lock(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<LockRequest>,
) -> AppResult<Json<LockResponse>> {
    let room = input.room_number;
    tracing::info!(
        room,
        duration_minutes = input.duration_minutes,
        reason = input.reason.as_deref().unwrap_or(""),
        user_id = auth.user_id,
        "Lock requested",
    );

    let access = state.access.clone();
    let minutes = input.duration_minutes;
    let record = run_to_completion(async move { access.lock(room, minutes).await }).await?;

    Ok(Json(LockResponse {
        message: format!("Auditorium {room} network disabled"),
        unlock_time: record.unlock_time,
    }))
}

/// POST /api/v1/auditoriums/unlock
pub async fn unlock(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UnlockRequest>,
) -> AppResult<Json<MessageResponse>> {
    let room = input.room_number;
    tracing::info!(room, user_id = auth.user_id, "Unlock requested");

    let access = state.access.clone();
    let record = run_to_completion(async move { access.unlock(room).await }).await?;

    let message = match record {
        Some(_) => format!("Auditorium {room} network enabled"),
        None => format!("Auditorium {room} network enabled; room has no stored state"),
    };
    Ok(Json(MessageResponse { message }))
}

/// POST /api/v1/auditoriums/configure
pub async fn configure(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ConfigureRequest>,
) -> AppResult<Json<MessageResponse>> {
    let room = input.room_number;
    tracing::info!(
        room,
        class_number = input.class_number,
        state = %input.state,
        user_id = auth.user_id,
        "Configure requested",
    );

    let access = state.access.clone();
    let output = run_to_completion(async move {
        access
            .configure(room, input.class_number, &input.state)
            .await
    })
    .await?;

    Ok(Json(MessageResponse { message: output }))
}

/// GET /api/v1/auditoriums/status
pub async fn status(State(state): State<AppState>) -> AppResult<Json<Vec<RoomStatus>>> {
    let records = state.access.status().await?;
    Ok(Json(records.into_iter().map(RoomStatus::from).collect()))
}

/// GET /api/v1/auditoriums/pending
pub async fn pending(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<PendingUnlock>> {
    Json(state.access.pending().await)
}

/// POST /api/v1/auditoriums/check_and_restore
pub async fn check_and_restore(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<RestoreResponse>> {
    tracing::info!(user_id = auth.user_id, "Reconciliation sweep requested");

    let access = state.access.clone();
    let report = run_to_completion(async move { access.check_and_restore().await }).await?;

    let message = if report.restored.is_empty() && report.failed.is_empty() {
        "No blocked auditoriums found".to_string()
    } else {
        format!(
            "Restored {} auditorium(s), {} failed",
            report.restored.len(),
            report.failed.len()
        )
    };
    Ok(Json(RestoreResponse {
        message,
        restored_rooms: report.restored,
        failed_rooms: report.failed,
    }))
}

/// POST /api/v1/auditoriums/check_network
pub async fn check_network(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CheckNetworkRequest>,
) -> AppResult<Json<CheckNetworkResponse>> {
    let room = input.room_number;
    tracing::info!(room, user_id = auth.user_id, "Network check requested");

    let access = state.access.clone();
    let output = run_to_completion(async move { access.check_network(room).await }).await?;

    Ok(Json(CheckNetworkResponse {
        message: format!("Network check for auditorium {room} completed"),
        output,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run an access operation on its own task and wait for its result.
async fn run_to_completion<F, T>(operation: F) -> AppResult<T>
where
    F: Future<Output = Result<T, AccessError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| AppError::InternalError(format!("Access operation aborted: {e}")))?
        .map_err(AppError::from)
}
