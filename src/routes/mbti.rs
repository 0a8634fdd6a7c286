use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::db::models::{MbtiResult, User};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::mbti::{self, Submission, TypeCount};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account/mbti/save", post(save))
        .route("/account/mbti/stats", get(stats))
        .route("/account/mbti", get(mine))
        .route("/account/mbti/{id}", get(for_user))
}

async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(submission): Json<Submission>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let result = mbti::save(&conn, &user.id, &submission)?;
    Ok(Json(json!({ "message": "result saved", "result": result })))
}

async fn mine(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<MbtiResult>> {
    let conn = state.db.get()?;
    MbtiResult::for_user(&conn, &user.id)?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn for_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<MbtiResult>> {
    let conn = state.db.get()?;
    if User::find(&conn, &id)?.is_none() {
        return Err(AppError::NotFound);
    }
    MbtiResult::for_user(&conn, &id)?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<TypeCount>>> {
    let conn = state.db.get()?;
    Ok(Json(mbti::statistics(&conn)?))
}
