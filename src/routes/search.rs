use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::models::{UserView, USER_VIEW_COLUMNS};
use crate::db::contains_pattern;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::posts::{queries, PostView};
use crate::state::AppState;

const MAX_USERS: usize = 20;
const MAX_POSTS: usize = 50;

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize, Default)]
pub struct SearchResponse {
    pub users: Vec<UserView>,
    pub posts: Vec<PostView>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/search", post(search))
}

async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SearchRequest>,
) -> AppResult<Json<SearchResponse>> {
    let query = req.query.trim();
    if query.is_empty() {
        return Ok(Json(SearchResponse::default()));
    }

    let conn = state.db.get()?;
    let pattern = contains_pattern(query);
    let users = UserView::list(
        &conn,
        &format!(
            "SELECT {} FROM users u
             WHERE u.is_active = 1
               AND (u.name LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\')
             ORDER BY u.name LIMIT {}",
            USER_VIEW_COLUMNS, MAX_USERS
        ),
        params![pattern],
    )?;
    let posts = queries::search(&conn, &user.id, query, MAX_POSTS)?;

    Ok(Json(SearchResponse { users, posts }))
}
