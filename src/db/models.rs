use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::media;

/// Full `users` row.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub avatar_path: Option<String>,
    pub friends_count: i64,
    pub posts_count: i64,
    pub show_likes_to_others: bool,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: String,
}

const USER_COLUMNS: &str = "id, email, name, password_hash, bio, avatar_path, friends_count, \
     posts_count, show_likes_to_others, is_active, is_admin, created_at";

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            bio: row.get(4)?,
            avatar_path: row.get(5)?,
            friends_count: row.get(6)?,
            posts_count: row.get(7)?,
            show_likes_to_others: row.get(8)?,
            is_active: row.get(9)?,
            is_admin: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email.trim()],
            Self::from_row,
        )
        .optional()
    }

    pub fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
            params![email.trim()],
            |row| row.get(0),
        )
    }

    /// Insert an active account. `Ok(false)` means the email is already registered.
    pub fn insert(
        conn: &Connection,
        id: &str,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> rusqlite::Result<bool> {
        match conn.execute(
            "INSERT INTO users (id, email, name, password_hash, is_active) VALUES (?1, ?2, ?3, ?4, 1)",
            params![id, email, name, password_hash],
        ) {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.avatar_path.as_deref().map(media::url_for)
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar_url(),
            bio: self.bio.clone(),
            friends_count: self.friends_count,
            posts_count: self.posts_count,
        }
    }
}

/// Public user shape embedded in every other response.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub friends_count: i64,
    pub posts_count: i64,
}

/// Select list for [`UserView::from_row_at`]; expects the table aliased `u`.
pub const USER_VIEW_COLUMNS: &str =
    "u.id, u.name, u.email, u.avatar_path, u.bio, u.friends_count, u.posts_count";

impl UserView {
    pub fn from_row_at(row: &Row<'_>, start: usize) -> rusqlite::Result<Self> {
        let avatar_path: Option<String> = row.get(start + 3)?;
        Ok(Self {
            id: row.get(start)?,
            name: row.get(start + 1)?,
            email: row.get(start + 2)?,
            avatar: avatar_path.as_deref().map(media::url_for),
            bio: row.get(start + 4)?,
            friends_count: row.get(start + 5)?,
            posts_count: row.get(start + 6)?,
        })
    }

    pub fn list(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(sql)?;
        let users = stmt
            .query_map(params, |row| Self::from_row_at(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendshipRequestView {
    pub id: String,
    pub created_by: UserView,
    pub message: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub body: String,
    pub type_of_notification: String,
    pub created_by_id: String,
    pub created_for_id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub friendrequest_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MbtiResult {
    pub id: String,
    pub user_id: String,
    pub personality_type: String,
    pub personality_category: String,
    pub introversion_score: i64,
    pub extroversion_score: i64,
    pub intuition_score: i64,
    pub sensing_score: i64,
    pub thinking_score: i64,
    pub feeling_score: i64,
    pub judging_score: i64,
    pub perceiving_score: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl MbtiResult {
    pub fn for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, user_id, personality_type, personality_category,
                    introversion_score, extroversion_score, intuition_score, sensing_score,
                    thinking_score, feeling_score, judging_score, perceiving_score,
                    created_at, updated_at
             FROM mbti_results WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Self {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    personality_type: row.get(2)?,
                    personality_category: row.get(3)?,
                    introversion_score: row.get(4)?,
                    extroversion_score: row.get(5)?,
                    intuition_score: row.get(6)?,
                    sensing_score: row.get(7)?,
                    thinking_score: row.get(8)?,
                    feeling_score: row.get(9)?,
                    judging_score: row.get(10)?,
                    perceiving_score: row.get(11)?,
                    created_at: row.get(12)?,
                    updated_at: row.get(13)?,
                })
            },
        )
        .optional()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Trend {
    pub hashtag: String,
    pub occurences: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostReport {
    pub id: String,
    pub post_id: String,
    pub reported_by_id: String,
    pub reason: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
}
