// Like toggling for posts and comments
use rusqlite::{params, Connection, OptionalExtension};

use crate::notifications::{self, NewNotification, NotificationKind};

#[derive(Debug, Clone, Copy)]
pub enum LikeTarget<'a> {
    Post(&'a str),
    Comment { post_id: &'a str, comment_id: &'a str },
}

impl LikeTarget<'_> {
    fn table(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "posts",
            LikeTarget::Comment { .. } => "comments",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "post_id",
            LikeTarget::Comment { .. } => "comment_id",
        }
    }

    fn id(&self) -> &str {
        match self {
            LikeTarget::Post(id) => id,
            LikeTarget::Comment { comment_id, .. } => comment_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggled {
    pub liked: bool,
    pub likes_count: i64,
}

/// Like the target if `user` hasn't yet, otherwise take the like back.
///
/// Expects the target to exist and runs inside the caller's transaction.
/// The owner is notified of new likes unless they liked their own content.
pub fn toggle(conn: &Connection, user: &str, target: LikeTarget<'_>) -> rusqlite::Result<Toggled> {
    let (table, column, id) = (target.table(), target.column(), target.id());

    let owner: String = conn.query_row(
        &format!("SELECT created_by FROM {} WHERE id = ?1", table),
        params![id],
        |row| row.get(0),
    )?;
    let existing: Option<String> = conn
        .query_row(
            &format!(
                "SELECT id FROM likes WHERE {} = ?1 AND created_by = ?2",
                column
            ),
            params![id, user],
            |row| row.get(0),
        )
        .optional()?;

    let liked = match existing {
        Some(like_id) => {
            conn.execute("DELETE FROM likes WHERE id = ?1", params![like_id])?;
            conn.execute(
                &format!(
                    "UPDATE {} SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?1",
                    table
                ),
                params![id],
            )?;
            false
        }
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO likes (id, created_by, {}) VALUES (?1, ?2, ?3)",
                    column
                ),
                params![uuid::Uuid::now_v7().to_string(), user, id],
            )?;
            conn.execute(
                &format!(
                    "UPDATE {} SET likes_count = likes_count + 1 WHERE id = ?1",
                    table
                ),
                params![id],
            )?;
            if owner != user {
                let notice = match target {
                    LikeTarget::Post(post_id) => {
                        NewNotification::new(NotificationKind::PostLike, user, &owner)
                            .post(post_id)
                    }
                    LikeTarget::Comment {
                        post_id,
                        comment_id,
                    } => NewNotification::new(NotificationKind::CommentLike, user, &owner)
                        .post(post_id)
                        .comment(comment_id),
                };
                notifications::create(conn, notice)?;
            }
            true
        }
    };

    let likes_count = conn.query_row(
        &format!("SELECT likes_count FROM {} WHERE id = ?1", table),
        params![id],
        |row| row.get(0),
    )?;
    Ok(Toggled { liked, likes_count })
}
