use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::password::{self, hash_password, verify_password};
use crate::auth::verification;
use crate::auth::{TokenKind, TokenPair};
use crate::db::models::{MbtiResult, User};
use crate::error::{AppError, AppResult, FormErrors};
use crate::extractors::CurrentUser;
use crate::media::MediaError;
use crate::routes::form_bool;
use crate::state::AppState;

// -- Request/Response types --

#[derive(Serialize)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub mbti_result: Option<MbtiResult>,
    pub is_admin: bool,
    pub show_likes_to_others: bool,
}

#[derive(Deserialize)]
pub struct SendCodeRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub email: Option<String>,
    pub code: Option<String>,
}

/// `success: false` answers are still 200s.
#[derive(Serialize)]
pub struct CodeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl CodeResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            verified: None,
        })
    }

    fn failed(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            message: message.into(),
            verified: None,
        })
    }
}

#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Serialize)]
pub struct SignupUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user: SignupUser,
    pub token: TokenPair,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize)]
pub struct ProfileUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub show_likes_to_others: bool,
}

#[derive(Deserialize)]
pub struct EditPasswordForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account/me", get(me))
        .route("/account/signup", post(signup))
        .route("/account/login", post(login))
        .route("/account/refresh", post(refresh))
        .route("/account/send-code", post(send_code))
        .route("/account/verify-code", post(verify_code))
        .route("/account/editprofile", post(edit_profile))
        .route("/account/editpassword", post(edit_password))
        .route("/account/change-password", post(change_password))
}

// -- Handlers --

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<MeResponse>> {
    let conn = state.db.get()?;
    let account = User::find(&conn, &user.id)?.ok_or(AppError::NotFound)?;
    let mbti_result = MbtiResult::for_user(&conn, &user.id)?;

    Ok(Json(MeResponse {
        avatar: account.avatar_url(),
        id: account.id,
        name: account.name,
        email: account.email,
        bio: account.bio,
        mbti_result,
        is_admin: account.is_admin,
        show_likes_to_others: account.show_likes_to_others,
    }))
}

fn code_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.config.verification.code_ttl_secs)
}

async fn send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> AppResult<Json<CodeResponse>> {
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Ok(CodeResponse::failed("email is required"));
    }
    if !verification::is_valid_email(email) {
        return Ok(CodeResponse::failed("enter a valid email address"));
    }
    {
        let conn = state.db.get()?;
        if User::email_taken(&conn, email)? {
            return Ok(CodeResponse::failed("this email is already registered"));
        }
    }

    let ttl = code_ttl(&state);
    let code = verification::issue_code(state.cache.as_ref(), email, ttl);
    let body = format!(
        "Your verification code is {}. It is valid for {} minutes; do not share it.",
        code,
        ttl.as_secs() / 60
    );

    match state
        .mailer
        .send(email, "Your email verification code", &body)
        .await
    {
        Ok(()) => {
            tracing::info!(%email, "Verification code sent");
            Ok(CodeResponse::ok("verification code sent, check your inbox"))
        }
        Err(e) => {
            tracing::warn!(%email, "Failed to send verification code: {}", e);
            Ok(CodeResponse::failed(format!(
                "failed to send verification code: {}",
                e
            )))
        }
    }
}

async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Json<CodeResponse> {
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    let code = req.code.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() || code.is_empty() {
        return CodeResponse::failed("email and code are required");
    }

    match verification::check_code(state.cache.as_ref(), email, code, code_ttl(&state)) {
        Ok(()) => Json(CodeResponse {
            success: true,
            message: "email verified".to_string(),
            verified: Some(true),
        }),
        Err(e) => CodeResponse::failed(e.message()),
    }
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<SignupResponse>> {
    let email = req.email.trim().to_string();
    let name = req.name.trim().to_string();

    if !req.is_verified {
        return Err(AppError::bad_request("email_not_verified"));
    }
    {
        let conn = state.db.get()?;
        if User::email_taken(&conn, &email)? {
            return Err(AppError::bad_request("email_exists"));
        }
    }

    let mut errors = FormErrors::new();
    if !verification::is_valid_email(&email) {
        errors
            .entry("email".into())
            .or_default()
            .push("Enter a valid email address.".into());
    }
    if name.is_empty() {
        errors
            .entry("name".into())
            .or_default()
            .push("This field is required.".into());
    }
    errors.extend(password::validate_new_password(
        &req.password1,
        &req.password2,
        "password2",
        "password2",
    ));
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if !verification::consume_verified(state.cache.as_ref(), &email) {
        return Err(AppError::bad_request("email_not_verified"));
    }

    let password_hash = hash_password(&req.password1, state.config.auth.password_cost)?;
    let id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.db.get()?;
        // A concurrent signup can win the race past email_taken
        if !User::insert(&conn, &id, &email, &name, &password_hash)? {
            return Err(AppError::bad_request("email_exists"));
        }
    }
    tracing::info!(user_id = %id, "Account created");

    let token = state.jwt.issue_pair(&id)?;
    Ok(Json(SignupResponse {
        message: "success",
        user: SignupUser { id, name, email },
        token,
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let user = {
        let conn = state.db.get()?;
        User::find_by_email(&conn, &req.email)?
    };
    let user = user
        .filter(|u| u.is_active)
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(state.jwt.issue_pair(&user.id)?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let claims = state.jwt.verify(&req.refresh, TokenKind::Refresh)?;
    let active = {
        let conn = state.db.get()?;
        User::find(&conn, &claims.sub)?.is_some_and(|u| u.is_active)
    };
    if !active {
        return Err(AppError::Unauthorized);
    }
    let access = state.jwt.issue(&claims.sub, TokenKind::Access)?;
    Ok(Json(json!({ "access": access })))
}

async fn edit_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut name: Option<String> = None;
    let mut bio: Option<String> = None;
    let mut show_likes: Option<bool> = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "bio" => bio = Some(field.text().await?),
            "show_likes_to_others" => {
                show_likes = Some(form_bool("show_likes_to_others", &field.text().await?)?)
            }
            "avatar" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                upload = Some((file_name, content_type, field.bytes().await?));
            }
            other => tracing::debug!("Ignoring profile field {}", other),
        }
    }

    let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        let mut errors = FormErrors::new();
        errors.insert("name".into(), vec!["This field is required.".into()]);
        return Err(AppError::Validation(errors));
    }

    // Nothing touches disk until the form is known to be valid
    let mut avatar: Option<String> = None;
    if let Some((file_name, content_type, bytes)) = upload {
        match state
            .media
            .save_image(
                "avatars",
                file_name.as_deref(),
                content_type.as_deref(),
                &bytes,
            )
            .await
        {
            Ok(path) => avatar = Some(path),
            // An empty file part means no avatar was picked
            Err(MediaError::Empty) => {}
            Err(MediaError::NotAnImage(kind)) => {
                return Err(AppError::bad_request(format!(
                    "avatar must be an image, got {}",
                    kind
                )))
            }
            Err(MediaError::Io(e)) => return Err(AppError::Io(e)),
        }
    }

    let (updated, old_avatar) = {
        let conn = state.db.get()?;
        let old_avatar = User::find(&conn, &user.id)?
            .ok_or(AppError::NotFound)?
            .avatar_path;
        conn.execute(
            "UPDATE users SET
                name = ?1,
                bio = CASE WHEN ?2 THEN ?3 ELSE bio END,
                avatar_path = COALESCE(?4, avatar_path),
                show_likes_to_others = COALESCE(?5, show_likes_to_others)
             WHERE id = ?6",
            params![name, bio.is_some(), bio, avatar, show_likes, user.id],
        )?;
        let updated = User::find(&conn, &user.id)?.ok_or(AppError::NotFound)?;
        (updated, old_avatar)
    };

    if let (Some(_), Some(old)) = (&avatar, old_avatar) {
        if let Err(e) = state.media.remove(&old).await {
            tracing::warn!(user_id = %user.id, "Failed to remove old avatar {}: {}", old, e);
        }
    }

    Ok(Json(json!({
        "message": "profile updated",
        "user": ProfileUser {
            avatar: updated.avatar_url(),
            id: updated.id,
            name: updated.name,
            email: updated.email,
            bio: updated.bio,
            show_likes_to_others: updated.show_likes_to_others,
        },
    })))
}

fn store_password(state: &AppState, user_id: &str, plaintext: &str) -> AppResult<()> {
    let hash = hash_password(plaintext, state.config.auth.password_cost)?;
    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![hash, user_id],
    )?;
    tracing::info!(%user_id, "Password changed");
    Ok(())
}

fn current_hash(state: &AppState, user_id: &str) -> AppResult<String> {
    let conn = state.db.get()?;
    Ok(User::find(&conn, user_id)?
        .ok_or(AppError::NotFound)?
        .password_hash)
}

async fn edit_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<EditPasswordForm>,
) -> AppResult<Json<Value>> {
    let mut errors = FormErrors::new();
    if !verify_password(&form.old_password, &current_hash(&state, &user.id)?) {
        errors.insert(
            "old_password".into(),
            vec!["Your old password was entered incorrectly. Please enter it again.".into()],
        );
    }
    errors.extend(password::validate_new_password(
        &form.new_password1,
        &form.new_password2,
        "new_password2",
        "new_password2",
    ));
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    store_password(&state, &user.id, &form.new_password1)?;
    Ok(Json(json!({ "message": "success" })))
}

async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let (Some(old), Some(new), Some(confirm)) =
        (req.old_password, req.new_password, req.confirm_password)
    else {
        return Err(AppError::bad_request(
            "old_password, new_password and confirm_password are required",
        ));
    };

    if new != confirm {
        return Err(AppError::bad_request(
            "new password and confirmation do not match",
        ));
    }
    if !verify_password(&old, &current_hash(&state, &user.id)?) {
        return Err(AppError::bad_request("old password is incorrect"));
    }
    if new == old {
        return Err(AppError::bad_request(
            "new password must differ from the old one",
        ));
    }

    store_password(&state, &user.id, &new)?;
    Ok(Json(json!({ "success": true, "message": "password changed" })))
}
