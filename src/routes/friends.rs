// Friendship handlers over the social repository
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::{FriendshipRequestView, User, UserView};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::social::{
    Decision, FriendshipRepository, RepositoryError, SocialError, SqliteFriendshipRepository,
};
use crate::state::AppState;

// -- Request/Response types --

#[derive(Deserialize, Default)]
pub struct FriendshipRequestBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct FriendsResponse {
    pub user: UserView,
    pub friends: Vec<UserView>,
    /// Pending requests, only filled in when viewing yourself.
    pub requests: Vec<FriendshipRequestView>,
}

// -- Error conversion --

impl From<SocialError> for AppError {
    fn from(err: SocialError) -> Self {
        match err {
            SocialError::UserNotFound | SocialError::RequestNotFound => AppError::NotFound,
            SocialError::SelfRequest
            | SocialError::NotFriends
            | SocialError::UnknownDecision(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Social(e) => e.into(),
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
        }
    }
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account/friends/{id}", get(friends))
        .route("/account/suggestions", get(suggestions))
        .route("/account/friendship-request/{id}", post(send_request))
        .route(
            "/account/friendship-request/{id}/{status}",
            post(handle_request),
        )
        .route("/account/remove-friend/{id}", post(remove_friend))
}

// -- Handlers --

async fn friends(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<FriendsResponse>> {
    let target = {
        let conn = state.db.get()?;
        User::find(&conn, &id)?.ok_or(AppError::NotFound)?
    };

    let repo = SqliteFriendshipRepository::new(state.db.clone());
    let friends = repo.friends_of(&target.id).await?;
    let requests = if target.id == user.id {
        repo.pending_for(&user.id).await?
    } else {
        Vec::new()
    };

    Ok(Json(FriendsResponse {
        user: target.view(),
        friends,
        requests,
    }))
}

async fn suggestions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<UserView>>> {
    let repo = SqliteFriendshipRepository::new(state.db.clone());
    Ok(Json(repo.suggestions_for(&user.id).await?))
}

async fn send_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Option<Json<FriendshipRequestBody>>,
) -> AppResult<Json<Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let repo = SqliteFriendshipRepository::new(state.db.clone());
    let outcome = repo.send_request(&user.id, &id, &body.message).await?;
    Ok(Json(json!({ "message": outcome.message() })))
}

async fn handle_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, status)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let decision: Decision = status.parse()?;
    let repo = SqliteFriendshipRepository::new(state.db.clone());
    repo.respond(&user.id, &id, decision).await?;
    Ok(Json(json!({ "message": "friendship request updated" })))
}

async fn remove_friend(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let repo = SqliteFriendshipRepository::new(state.db.clone());
    repo.remove_friend(&user.id, &id).await?;
    Ok(Json(json!({ "success": true, "message": "friend removed" })))
}
