use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};
use serde::Serialize;

use crate::db::models::{Attachment, UserView, USER_VIEW_COLUMNS};
use crate::media;

// --- View structs ---

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub body: String,
    pub is_private: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_by: UserView,
    pub created_at: String,
    pub created_at_formatted: String,
    pub attachments: Vec<Attachment>,
    /// Whether the viewer has liked this post.
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostView,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub body: String,
    pub likes_count: i64,
    pub created_by: UserView,
    pub created_at: String,
    pub created_at_formatted: String,
    pub is_liked: bool,
}

// Every post query binds the viewer as ?1.
const POST_SELECT: &str = "p.id, p.body, p.is_private, p.likes_count, p.comments_count, p.created_at,
     EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.created_by = ?1)";
const POST_WIDTH: usize = 7;

/// Posts visible to the viewer: their own, or anyone's public ones.
const VISIBLE_TO_VIEWER: &str = "(p.created_by = ?1 OR p.is_private = 0)";

/// Authored by the viewer or one of their friends.
const IN_VIEWER_NETWORK: &str = "(p.created_by = ?1 OR p.created_by IN
    (SELECT friend_id FROM friendships WHERE user_id = ?1))";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let created_at: String = row.get(5)?;
    Ok(PostView {
        id: row.get(0)?,
        body: row.get(1)?,
        is_private: row.get(2)?,
        likes_count: row.get(3)?,
        comments_count: row.get(4)?,
        created_at_formatted: humanize_timestamp(&created_at),
        created_at,
        is_liked: row.get(6)?,
        created_by: UserView::from_row_at(row, POST_WIDTH)?,
        attachments: Vec::new(),
    })
}

/// Run a post query. `filter` is the WHERE clause; `args` bind from ?2 on.
fn list_posts(
    conn: &Connection,
    viewer: &str,
    filter: &str,
    args: Vec<Value>,
    limit: Option<usize>,
) -> rusqlite::Result<Vec<PostView>> {
    let mut sql = format!(
        "SELECT {}, {} FROM posts p JOIN users u ON u.id = p.created_by
         WHERE {} ORDER BY p.created_at DESC, p.id DESC",
        POST_SELECT, USER_VIEW_COLUMNS, filter
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut bound = vec![Value::Text(viewer.to_string())];
    bound.extend(args);

    let mut stmt = conn.prepare(&sql)?;
    let mut posts = stmt
        .query_map(params_from_iter(bound), post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for post in &mut posts {
        post.attachments = attachments_for(conn, &post.id)?;
    }
    Ok(posts)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// The viewer's own posts plus their friends' public posts.
pub fn feed(conn: &Connection, viewer: &str) -> rusqlite::Result<Vec<PostView>> {
    let filter = format!("{} AND {}", IN_VIEWER_NETWORK, VISIBLE_TO_VIEWER);
    list_posts(conn, viewer, &filter, Vec::new(), None)
}

/// Public posts from the viewer's feed mentioning `#trend`, case-insensitively.
pub fn tagged(conn: &Connection, viewer: &str, trend: &str) -> rusqlite::Result<Vec<PostView>> {
    let pattern = crate::db::contains_pattern(&format!("#{}", trend));
    let filter = format!(
        "{} AND p.is_private = 0 AND p.body LIKE ?2 ESCAPE '\\'",
        IN_VIEWER_NETWORK
    );
    list_posts(
        conn,
        viewer,
        &filter,
        vec![text(&pattern)],
        None,
    )
}

pub fn visible(conn: &Connection, viewer: &str, post_id: &str) -> rusqlite::Result<Option<PostView>> {
    let filter = format!("p.id = ?2 AND {}", VISIBLE_TO_VIEWER);
    Ok(list_posts(conn, viewer, &filter, vec![text(post_id)], Some(1))?
        .into_iter()
        .next())
}

/// A post only its owner may act on; `None` when missing or owned by someone else.
pub fn owned(conn: &Connection, viewer: &str, post_id: &str) -> rusqlite::Result<Option<PostView>> {
    Ok(list_posts(
        conn,
        viewer,
        "p.id = ?2 AND p.created_by = ?1",
        vec![text(post_id)],
        Some(1),
    )?
    .into_iter()
    .next())
}

/// Everything on `owner`'s profile the viewer is allowed to see.
pub fn profile(conn: &Connection, viewer: &str, owner: &str) -> rusqlite::Result<Vec<PostView>> {
    list_posts(
        conn,
        viewer,
        "p.created_by = ?2 AND (?1 = ?2 OR p.is_private = 0)",
        vec![text(owner)],
        None,
    )
}

/// Posts `liker` has liked. Someone else looking only sees public posts
/// and their own.
pub fn liked_by(conn: &Connection, viewer: &str, liker: &str) -> rusqlite::Result<Vec<PostView>> {
    let filter = format!(
        "p.id IN (SELECT post_id FROM likes WHERE created_by = ?2 AND post_id IS NOT NULL)
         AND (?1 = ?2 OR {})",
        VISIBLE_TO_VIEWER
    );
    list_posts(conn, viewer, &filter, vec![text(liker)], None)
}

/// Visible posts whose body contains `query`.
pub fn search(
    conn: &Connection,
    viewer: &str,
    query: &str,
    limit: usize,
) -> rusqlite::Result<Vec<PostView>> {
    let filter = format!("p.body LIKE ?2 ESCAPE '\\' AND {}", VISIBLE_TO_VIEWER);
    list_posts(
        conn,
        viewer,
        &filter,
        vec![text(&crate::db::contains_pattern(query))],
        Some(limit),
    )
}

pub fn attachments_for(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<Attachment>> {
    let mut stmt = conn.prepare(
        "SELECT id, image_path FROM attachments WHERE post_id = ?1 ORDER BY created_at, id",
    )?;
    let attachments = stmt
        .query_map(params![post_id], |row| {
            let path: String = row.get(1)?;
            Ok(Attachment {
                id: row.get(0)?,
                url: media::url_for(&path),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(attachments)
}

/// Relative paths of a post's stored images, for cleanup.
pub fn attachment_paths(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT image_path FROM attachments WHERE post_id = ?1")?;
    let paths = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(paths)
}

// --- Comments ---

const COMMENT_SELECT: &str = "c.id, c.post_id, c.body, c.likes_count, c.created_at,
     EXISTS(SELECT 1 FROM likes l WHERE l.comment_id = c.id AND l.created_by = ?1)";
const COMMENT_WIDTH: usize = 6;

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    let created_at: String = row.get(4)?;
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        body: row.get(2)?,
        likes_count: row.get(3)?,
        created_at_formatted: humanize_timestamp(&created_at),
        created_at,
        is_liked: row.get(5)?,
        created_by: UserView::from_row_at(row, COMMENT_WIDTH)?,
    })
}

/// Comments on a post, oldest first.
pub fn comments_for(
    conn: &Connection,
    viewer: &str,
    post_id: &str,
) -> rusqlite::Result<Vec<CommentView>> {
    let sql = format!(
        "SELECT {}, {} FROM comments c JOIN users u ON u.id = c.created_by
         WHERE c.post_id = ?2 ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT, USER_VIEW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map(params![viewer, post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// A comment on the given post, or `None`.
pub fn comment(
    conn: &Connection,
    viewer: &str,
    post_id: &str,
    comment_id: &str,
) -> rusqlite::Result<Option<CommentView>> {
    let sql = format!(
        "SELECT {}, {} FROM comments c JOIN users u ON u.id = c.created_by
         WHERE c.post_id = ?2 AND c.id = ?3",
        COMMENT_SELECT, USER_VIEW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![viewer, post_id, comment_id], comment_from_row)?;
    rows.next().transpose()
}

// --- Time formatting ---

/// Render a `datetime('now')` column the way the feed shows it.
pub fn humanize_timestamp(db_time: &str) -> String {
    match NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S") {
        Ok(dt) => time_since(&dt),
        Err(_) => db_time.to_string(),
    }
}

fn time_since(dt: &NaiveDateTime) -> String {
    let diff = Utc::now().naive_utc().signed_duration_since(*dt);

    match diff.num_seconds() {
        s if s < 60 => "just now".to_string(),
        s if s < 60 * 60 => format!("{}m ago", diff.num_minutes()),
        s if s < 24 * 60 * 60 => format!("{}h ago", diff.num_hours()),
        s if s < 7 * 24 * 60 * 60 => format!("{}d ago", diff.num_days()),
        _ => dt.format("%b %-d, %Y").to_string(),
    }
}
