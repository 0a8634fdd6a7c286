use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::db::models::Notification;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::notifications;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(unread))
        .route("/notifications/read/{id}", post(read_one))
        .route("/notifications/read-all", post(read_all))
}

async fn unread(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Notification>>> {
    let conn = state.db.get()?;
    Ok(Json(notifications::unread_for(&conn, &user.id)?))
}

async fn read_one(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    if !notifications::mark_read(&conn, &id, &user.id)? {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "message": "notification read" })))
}

async fn read_all(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let count = notifications::mark_all_read(&conn, &user.id)?;
    Ok(Json(json!({ "message": "all notifications read", "count": count })))
}
