pub mod account;
pub mod friends;
pub mod mbti;
pub mod notifications;
pub mod posts;
pub mod search;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The full HTTP surface, ready to serve.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.storage.max_upload_bytes;
    let media = ServeDir::new(state.media.root());

    Router::new()
        .route("/health", get(health))
        .merge(account::router())
        .merge(friends::router())
        .merge(mbti::router())
        .merge(notifications::router())
        .merge(posts::router())
        .merge(search::router())
        .nest_service("/media", media)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Strict boolean for multipart text fields: `true|false|1|0`, any case.
pub(crate) fn form_bool(field: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::bad_request(format!(
            "{} must be one of true, false, 1, 0",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_bool_accepts_known_spellings() {
        assert!(form_bool("f", "true").unwrap());
        assert!(form_bool("f", "TRUE").unwrap());
        assert!(form_bool("f", " 1 ").unwrap());
        assert!(!form_bool("f", "False").unwrap());
        assert!(!form_bool("f", "0").unwrap());
    }

    #[test]
    fn form_bool_rejects_everything_else() {
        for value in ["yes", "t", "", "2", "on"] {
            assert!(matches!(
                form_bool("is_private", value),
                Err(AppError::BadRequest(_))
            ));
        }
    }
}
