mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{Part, TestApp, PASSWORD};
use wey::auth::TokenKind;

async fn request_code(app: &TestApp, email: &str) -> String {
    let (status, body) = app
        .post_json("/account/send-code", None, json!({ "email": email }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "send-code failed: {}", body);
    app.mailer.last_code_for(email).expect("no code mailed")
}

async fn signup(app: &TestApp, email: &str) -> serde_json::Value {
    let code = request_code(app, email).await;
    let (_, verified) = app
        .post_json(
            "/account/verify-code",
            None,
            json!({ "email": email, "code": code }),
        )
        .await;
    assert_eq!(verified["success"], true);

    let (status, body) = app
        .post_json(
            "/account/signup",
            None,
            json!({
                "email": email,
                "name": "New Person",
                "password1": "s3cret-passphrase",
                "password2": "s3cret-passphrase",
                "is_verified": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "signup failed: {}", body);
    body
}

// ============================================================================
// EMAIL VERIFICATION
// ============================================================================

#[tokio::test]
async fn verification_code_succeeds_exactly_once() {
    let app = TestApp::new();
    let code = request_code(&app, "new@example.com").await;

    let payload = json!({ "email": "new@example.com", "code": code });
    let (_, first) = app
        .post_json("/account/verify-code", None, payload.clone())
        .await;
    assert_eq!(first["success"], true);
    assert_eq!(first["verified"], true);

    let (status, second) = app.post_json("/account/verify-code", None, payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], false);
}

#[tokio::test]
async fn wrong_code_fails_and_keeps_the_entry() {
    let app = TestApp::new();
    let code = request_code(&app, "new@example.com").await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (_, bad) = app
        .post_json(
            "/account/verify-code",
            None,
            json!({ "email": "new@example.com", "code": wrong }),
        )
        .await;
    assert_eq!(bad["success"], false);

    let (_, good) = app
        .post_json(
            "/account/verify-code",
            None,
            json!({ "email": "new@example.com", "code": code }),
        )
        .await;
    assert_eq!(good["success"], true);
}

#[tokio::test]
async fn send_code_refuses_registered_and_missing_emails() {
    let app = TestApp::new();
    app.create_user("taken@example.com", "Taken");

    let (status, body) = app
        .post_json(
            "/account/send-code",
            None,
            json!({ "email": "taken@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (_, body) = app.post_json("/account/send-code", None, json!({})).await;
    assert_eq!(body["success"], false);
    assert_eq!(app.mailer.count(), 0);
}

// ============================================================================
// SIGNUP / LOGIN / REFRESH
// ============================================================================

#[tokio::test]
async fn signup_after_verification_returns_tokens() {
    let app = TestApp::new();
    let body = signup(&app, "new@example.com").await;

    assert_eq!(body["message"], "success");
    assert_eq!(body["user"]["email"], "new@example.com");
    let access = body["token"]["access"].as_str().unwrap();

    let (status, me) = app.get("/account/me", Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "New Person");
    assert!(me["mbti_result"].is_null());
    assert_eq!(me["show_likes_to_others"], true);
}

#[tokio::test]
async fn signup_without_server_side_verification_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/account/signup",
            None,
            json!({
                "email": "sneaky@example.com",
                "name": "Sneaky",
                "password1": "s3cret-passphrase",
                "password2": "s3cret-passphrase",
                "is_verified": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email_not_verified");
}

#[tokio::test]
async fn signup_rejects_existing_email() {
    let app = TestApp::new();
    app.create_user("taken@example.com", "Taken");
    let (status, body) = app
        .post_json(
            "/account/signup",
            None,
            json!({
                "email": "taken@example.com",
                "name": "Again",
                "password1": "s3cret-passphrase",
                "password2": "s3cret-passphrase",
                "is_verified": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email_exists");
}

#[tokio::test]
async fn signup_form_errors_are_reported_per_field() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/account/signup",
            None,
            json!({
                "email": "new@example.com",
                "name": "",
                "password1": "12345678",
                "password2": "12345679",
                "is_verified": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["password2"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn login_and_refresh() {
    let app = TestApp::new();
    app.create_user("a@example.com", "Alice");

    let (status, _) = app
        .post_json(
            "/account/login",
            None,
            json!({ "email": "a@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, tokens) = app
        .post_json(
            "/account/login",
            None,
            json!({ "email": "a@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = tokens["access"].as_str().unwrap().to_string();
    let refresh = tokens["refresh"].as_str().unwrap().to_string();

    // An access token is not a refresh token, and vice versa
    let (status, _) = app
        .post_json("/account/refresh", None, json!({ "refresh": access }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/account/me", Some(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, renewed) = app
        .post_json("/account/refresh", None, json!({ "refresh": refresh }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .get("/account/me", Some(renewed["access"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_need_a_live_account() {
    let app = TestApp::new();
    let (status, _) = app.get("/account/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/posts", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (id, token) = app.create_user("a@example.com", "Alice");
    app.conn()
        .execute(
            "UPDATE users SET is_active = 0 WHERE id = ?1",
            rusqlite::params![id],
        )
        .unwrap();
    let (status, _) = app.get("/account/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stale = app.state.jwt.issue("no-such-user", TokenKind::Access).unwrap();
    let (status, _) = app.get("/account/me", Some(&stale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// PROFILE
// ============================================================================

#[tokio::test]
async fn edit_profile_updates_fields_and_avatar() {
    let app = TestApp::new();
    let (_, token) = app.create_user("a@example.com", "Alice");

    let (status, body) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[
                Part::Text("name", "Alice Liddell"),
                Part::Text("bio", "down the rabbit hole"),
                Part::Text("show_likes_to_others", "FALSE"),
                Part::File {
                    name: "avatar",
                    file_name: "me.png",
                    content_type: "image/png",
                    bytes: b"\x89PNG\r\n\x1a\nfake",
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["name"], "Alice Liddell");
    assert_eq!(body["user"]["bio"], "down the rabbit hole");
    assert_eq!(body["user"]["show_likes_to_others"], false);

    let avatar = body["user"]["avatar"].as_str().unwrap().to_string();
    assert!(avatar.starts_with("/media/avatars/"));
    let (status, _) = app.get(&avatar, None).await;
    assert_eq!(status, StatusCode::OK);

    // Absent bio keeps it; present empty bio clears it
    let (_, kept) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[Part::Text("name", "Alice")],
        )
        .await;
    assert_eq!(kept["user"]["bio"], "down the rabbit hole");
    assert_eq!(kept["user"]["avatar"], avatar.as_str());

    let (_, cleared) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[Part::Text("name", "Alice"), Part::Text("bio", "")],
        )
        .await;
    assert_eq!(cleared["user"]["bio"], "");
}

#[tokio::test]
async fn edit_profile_rejects_bad_input() {
    let app = TestApp::new();
    let (_, token) = app.create_user("a@example.com", "Alice");

    let (status, _) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[
                Part::Text("name", "Alice"),
                Part::Text("show_likes_to_others", "yes"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[Part::Text("name", "   ")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["name"].is_array());

    let (status, _) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[
                Part::Text("name", "Alice"),
                Part::File {
                    name: "avatar",
                    file_name: "notes.txt",
                    content_type: "text/plain",
                    bytes: b"hello",
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_profile_leaves_no_avatar_behind() {
    let app = TestApp::new();
    let (_, token) = app.create_user("a@example.com", "Alice");

    let (status, body) = app
        .post_multipart(
            "/account/editprofile",
            Some(&token),
            &[
                Part::File {
                    name: "avatar",
                    file_name: "me.png",
                    content_type: "image/png",
                    bytes: b"\x89PNG\r\n\x1a\nfake",
                },
                Part::Text("name", ""),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["name"].is_array());

    let avatars = app.state.media.root().join("avatars");
    let stored = std::fs::read_dir(&avatars)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(stored, 0);
}

// ============================================================================
// PASSWORDS
// ============================================================================

async fn change_password(
    app: &TestApp,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    app.json(Method::POST, "/account/change-password", Some(token), body)
        .await
}

#[tokio::test]
async fn change_password_rules() {
    let app = TestApp::new();
    let (_, token) = app.create_user("a@example.com", "Alice");
    let change = |body| change_password(&app, &token, body);

    let (status, _) = change(json!({ "old_password": PASSWORD, "new_password": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = change(json!({
        "old_password": PASSWORD,
        "new_password": "brand-new-pass",
        "confirm_password": "different-pass",
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = change(json!({
        "old_password": "not-my-password",
        "new_password": "brand-new-pass",
        "confirm_password": "brand-new-pass",
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = change(json!({
        "old_password": PASSWORD,
        "new_password": PASSWORD,
        "confirm_password": PASSWORD,
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = change(json!({
        "old_password": PASSWORD,
        "new_password": "brand-new-pass",
        "confirm_password": "brand-new-pass",
    }))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app
        .post_json(
            "/account/login",
            None,
            json!({ "email": "a@example.com", "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn edit_password_form() {
    let app = TestApp::new();
    let (_, token) = app.create_user("a@example.com", "Alice");

    let (status, body) = app
        .post_form(
            "/account/editpassword",
            Some(&token),
            &[
                ("old_password", "wrong"),
                ("new_password1", "another-pass"),
                ("new_password2", "another-pass"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["old_password"].is_array());

    let (status, body) = app
        .post_form(
            "/account/editpassword",
            Some(&token),
            &[
                ("old_password", PASSWORD),
                ("new_password1", "another-pass"),
                ("new_password2", "another-pass"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "success");
}

// ============================================================================
// MBTI
// ============================================================================

#[tokio::test]
async fn mbti_save_get_and_stats() {
    let app = TestApp::new();
    let (a_id, a_token) = app.create_user("a@example.com", "Alice");
    let (_, b_token) = app.create_user("b@example.com", "Bob");

    let (status, _) = app.get("/account/mbti", Some(&a_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, saved) = app
        .post_json(
            "/account/mbti/save",
            Some(&a_token),
            json!({ "introversion_score": 7, "extroversion_score": 3, "feeling_score": 6 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["result"]["personality_type"], "INFJ");
    assert_eq!(saved["result"]["personality_category"], "Diplomats");

    let (status, theirs) = app
        .get(&format!("/account/mbti/{}", a_id), Some(&b_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(theirs["personality_type"], "INFJ");

    let (status, _) = app.get("/account/mbti/unknown-user", Some(&b_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.post_json(
        "/account/mbti/save",
        Some(&b_token),
        json!({ "personality_type": "ESTP" }),
    )
    .await;
    let (_, stats) = app.get("/account/mbti/stats", Some(&a_token)).await;
    assert_eq!(
        stats,
        json!([{ "type": "ESTP", "count": 1 }, { "type": "INFJ", "count": 1 }])
    );

    let (_, me) = app.get("/account/me", Some(&a_token)).await;
    assert_eq!(me["mbti_result"]["personality_type"], "INFJ");
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
