use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::{PostReport, Trend, User, UserView};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::notifications::{self, NewNotification, NotificationKind};
use crate::posts::{
    likes, queries, reports, trends, CommentView, LikeTarget, PostDetail, PostView,
    BODY_MAX_CHARS,
};
use crate::routes::form_bool;
use crate::social::{FriendshipRepository, SqliteFriendshipRepository};
use crate::state::AppState;

// --- Forms ---

#[derive(Deserialize)]
pub struct FeedQuery {
    pub trend: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub body: Option<String>,
}

#[derive(Deserialize)]
pub struct ReportBody {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePostBody {
    pub is_private: Option<bool>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub posts: Vec<PostView>,
    pub user: UserView,
    pub can_send_friendship_request: bool,
    pub is_friend: bool,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub message: &'static str,
    pub report: PostReport,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(feed).post(create_post))
        .route("/posts/trends", get(get_trends))
        .route(
            "/posts/{id}",
            get(post_detail).put(update_post).delete(delete_post),
        )
        .route("/posts/profile/{id}", get(profile_posts))
        .route("/posts/liked/{id}", get(liked_posts))
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/comment", post(create_comment))
        .route("/posts/{id}/comment/{cid}/like", post(like_comment))
        .route("/posts/{id}/report", post(report_post))
}

// --- Handlers ---

async fn feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    let trend = query.trend.as_deref().map(str::trim).unwrap_or_default();
    let posts = if trend.is_empty() {
        queries::feed(&conn, &user.id)?
    } else {
        queries::tagged(&conn, &user.id, trend)?
    };
    Ok(Json(posts))
}

async fn post_detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let post = queries::visible(&conn, &user.id, &id)?.ok_or(AppError::NotFound)?;
    let comments = queries::comments_for(&conn, &user.id, &id)?;
    Ok(Json(json!({ "post": PostDetail { post, comments } })))
}

async fn profile_posts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ProfileResponse>> {
    let (owner, posts) = {
        let conn = state.db.get()?;
        let owner = User::find(&conn, &id)?.ok_or(AppError::NotFound)?;
        let posts = queries::profile(&conn, &user.id, &owner.id)?;
        (owner, posts)
    };

    let repo = SqliteFriendshipRepository::new(state.db.clone());
    let relationship = repo.relationship(&user.id, &owner.id).await?;

    Ok(Json(ProfileResponse {
        posts,
        user: owner.view(),
        can_send_friendship_request: relationship.can_send_friendship_request,
        is_friend: relationship.is_friend,
    }))
}

async fn liked_posts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    let liker = User::find(&conn, &id)?.ok_or(AppError::NotFound)?;
    if liker.id != user.id && !liker.show_likes_to_others {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(queries::liked_by(&conn, &user.id, &liker.id)?))
}

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: axum::body::Bytes,
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<PostView>> {
    let mut body = String::new();
    let mut is_private = false;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "body" => body = field.text().await?,
            "is_private" => is_private = form_bool("is_private", &field.text().await?)?,
            "image" => uploads.push(Upload {
                file_name: field.file_name().map(str::to_string),
                content_type: field.content_type().map(str::to_string),
                bytes: field.bytes().await?,
            }),
            other => tracing::debug!("Ignoring post field {}", other),
        }
    }

    let body = body.trim().to_string();
    if body.chars().count() > BODY_MAX_CHARS {
        return Err(AppError::bad_request(format!(
            "post body must be {} characters or less",
            BODY_MAX_CHARS
        )));
    }

    let mut stored = Vec::new();
    for upload in uploads {
        match state
            .media
            .save_image(
                "attachments",
                upload.file_name.as_deref(),
                upload.content_type.as_deref(),
                &upload.bytes,
            )
            .await
        {
            Ok(path) => stored.push(path),
            Err(e) => tracing::warn!(user_id = %user.id, "Skipping attachment: {}", e),
        }
    }

    if body.is_empty() && stored.is_empty() {
        return Err(AppError::bad_request(
            "post body cannot be empty without an image",
        ));
    }

    let post_id = uuid::Uuid::now_v7().to_string();
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO posts (id, created_by, body, is_private) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, user.id, body, is_private],
    )?;
    for path in &stored {
        tx.execute(
            "INSERT INTO attachments (id, post_id, created_by, image_path) VALUES (?1, ?2, ?3, ?4)",
            params![uuid::Uuid::now_v7().to_string(), post_id, user.id, path],
        )?;
    }
    tx.execute(
        "UPDATE users SET posts_count = posts_count + 1 WHERE id = ?1",
        params![user.id],
    )?;
    if !is_private {
        trends::refresh(&tx)?;
    }
    tx.commit()?;
    tracing::info!(user_id = %user.id, %post_id, attachments = stored.len(), "Post created");

    let post = queries::visible(&conn, &user.id, &post_id)?.ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<UpdatePostBody>,
) -> AppResult<Json<PostView>> {
    let mut conn = state.db.get()?;
    let post = queries::owned(&conn, &user.id, &id)?.ok_or(AppError::NotFound)?;

    let Some(is_private) = update.is_private.filter(|p| *p != post.is_private) else {
        return Ok(Json(post));
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "UPDATE posts SET is_private = ?1 WHERE id = ?2",
        params![is_private, id],
    )?;
    trends::refresh(&tx)?;
    tx.commit()?;

    let post = queries::owned(&conn, &user.id, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let paths = {
        let mut conn = state.db.get()?;
        if queries::owned(&conn, &user.id, &id)?.is_none() {
            return Err(AppError::NotFound);
        }
        let paths = queries::attachment_paths(&conn, &id)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        tx.execute(
            "UPDATE users SET posts_count = MAX(posts_count - 1, 0) WHERE id = ?1",
            params![user.id],
        )?;
        trends::refresh(&tx)?;
        tx.commit()?;
        paths
    };
    tracing::info!(user_id = %user.id, post_id = %id, "Post deleted");

    for path in paths {
        if let Err(e) = state.media.remove(&path).await {
            tracing::warn!(post_id = %id, "Failed to remove attachment {}: {}", path, e);
        }
    }

    Ok(Json(json!({ "message": "post deleted" })))
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostView>> {
    let mut conn = state.db.get()?;
    if queries::visible(&conn, &user.id, &id)?.is_none() {
        return Err(AppError::NotFound);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    likes::toggle(&tx, &user.id, LikeTarget::Post(&id))?;
    tx.commit()?;

    let post = queries::visible(&conn, &user.id, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

async fn like_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, comment_id)): Path<(String, String)>,
) -> AppResult<Json<CommentView>> {
    let mut conn = state.db.get()?;
    if queries::visible(&conn, &user.id, &id)?.is_none()
        || queries::comment(&conn, &user.id, &id, &comment_id)?.is_none()
    {
        return Err(AppError::NotFound);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    likes::toggle(
        &tx,
        &user.id,
        LikeTarget::Comment {
            post_id: &id,
            comment_id: &comment_id,
        },
    )?;
    tx.commit()?;

    let comment = queries::comment(&conn, &user.id, &id, &comment_id)?.ok_or(AppError::NotFound)?;
    Ok(Json(comment))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CommentBody>,
) -> AppResult<Json<CommentView>> {
    let body = req.body.as_deref().map(str::trim).unwrap_or_default();
    if body.is_empty() {
        return Err(AppError::bad_request("comment body is required"));
    }

    let mut conn = state.db.get()?;
    let post = queries::visible(&conn, &user.id, &id)?.ok_or(AppError::NotFound)?;

    let comment_id = uuid::Uuid::now_v7().to_string();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO comments (id, post_id, created_by, body) VALUES (?1, ?2, ?3, ?4)",
        params![comment_id, id, user.id, body],
    )?;
    tx.execute(
        "UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?1",
        params![id],
    )?;
    if post.created_by.id != user.id {
        notifications::create(
            &tx,
            NewNotification::new(NotificationKind::PostComment, &user.id, &post.created_by.id)
                .post(&id)
                .comment(&comment_id),
        )?;
    }
    tx.commit()?;

    let comment = queries::comment(&conn, &user.id, &id, &comment_id)?.ok_or(AppError::NotFound)?;
    Ok(Json(comment))
}

async fn report_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ReportBody>,
) -> AppResult<Json<ReportResponse>> {
    let mut conn = state.db.get()?;
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound);
    }

    let reason = req.reason.as_deref().map(str::trim).unwrap_or_default();
    if reason.is_empty() {
        return Err(AppError::bad_request("a reason is required"));
    }

    let (outcome, report) = reports::upsert(&mut conn, &id, &user.id, reason)?;
    tracing::info!(post_id = %id, reporter = %user.id, "Post reported");
    Ok(Json(ReportResponse {
        message: outcome.message(),
        report,
    }))
}

async fn get_trends(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Trend>>> {
    let conn = state.db.get()?;
    Ok(Json(trends::top(&conn, trends::TOP_TRENDS)?))
}
