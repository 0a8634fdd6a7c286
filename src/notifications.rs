//! Notification rows written as side effects of other mutations.
//!
//! Every writer takes a plain `&Connection` so it can run inside the caller's
//! transaction.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewFriendRequest,
    AcceptedFriendRequest,
    RejectedFriendRequest,
    PostLike,
    PostComment,
    CommentLike,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewFriendRequest => "new_friendrequest",
            NotificationKind::AcceptedFriendRequest => "accepted_friendrequest",
            NotificationKind::RejectedFriendRequest => "rejected_friendrequest",
            NotificationKind::PostLike => "post_like",
            NotificationKind::PostComment => "post_comment",
            NotificationKind::CommentLike => "comment_like",
        }
    }

    pub fn body(&self, actor: &str) -> String {
        match self {
            NotificationKind::NewFriendRequest => format!("{} sent you a friend request", actor),
            NotificationKind::AcceptedFriendRequest => {
                format!("{} accepted your friend request", actor)
            }
            NotificationKind::RejectedFriendRequest => {
                format!("{} rejected your friend request", actor)
            }
            NotificationKind::PostLike => format!("{} liked one of your posts", actor),
            NotificationKind::PostComment => format!("{} commented on one of your posts", actor),
            NotificationKind::CommentLike => format!("{} liked your comment", actor),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub kind: NotificationKind,
    pub created_by: &'a str,
    pub created_for: &'a str,
    pub post_id: Option<&'a str>,
    pub comment_id: Option<&'a str>,
    pub friendrequest_id: Option<&'a str>,
}

impl<'a> NewNotification<'a> {
    pub fn new(kind: NotificationKind, created_by: &'a str, created_for: &'a str) -> Self {
        Self {
            kind,
            created_by,
            created_for,
            post_id: None,
            comment_id: None,
            friendrequest_id: None,
        }
    }

    pub fn post(mut self, post_id: &'a str) -> Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn comment(mut self, comment_id: &'a str) -> Self {
        self.comment_id = Some(comment_id);
        self
    }

    pub fn friend_request(mut self, request_id: &'a str) -> Self {
        self.friendrequest_id = Some(request_id);
        self
    }
}

/// Insert a notification; the body names the acting user.
pub fn create(conn: &Connection, new: NewNotification<'_>) -> rusqlite::Result<String> {
    let actor: String = conn
        .query_row(
            "SELECT name FROM users WHERE id = ?1",
            params![new.created_by],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or_else(|| "Someone".to_string());

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO notifications
            (id, body, type_of_notification, created_by, created_for, post_id, comment_id, friendrequest_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.kind.body(&actor),
            new.kind.as_str(),
            new.created_by,
            new.created_for,
            new.post_id,
            new.comment_id,
            new.friendrequest_id,
        ],
    )?;
    Ok(id)
}

pub fn unread_for(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, body, type_of_notification, created_by, created_for,
                post_id, comment_id, friendrequest_id, is_read, created_at
         FROM notifications
         WHERE created_for = ?1 AND is_read = 0
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(Notification {
                id: row.get(0)?,
                body: row.get(1)?,
                type_of_notification: row.get(2)?,
                created_by_id: row.get(3)?,
                created_for_id: row.get(4)?,
                post_id: row.get(5)?,
                comment_id: row.get(6)?,
                friendrequest_id: row.get(7)?,
                is_read: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark one notification read. False if it doesn't exist or isn't addressed to `user_id`.
pub fn mark_read(conn: &Connection, id: &str, user_id: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND created_for = ?2",
        params![id, user_id],
    )?;
    Ok(changed > 0)
}

/// Mark every unread notification for `user_id` read; returns how many changed.
pub fn mark_all_read(conn: &Connection, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE created_for = ?1 AND is_read = 0",
        params![user_id],
    )
}

/// Drop the "new friend request" notices `requester` sent to `recipient`.
pub fn delete_friend_request_notices(
    conn: &Connection,
    requester: &str,
    recipient: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM notifications
         WHERE created_by = ?1 AND created_for = ?2 AND type_of_notification = ?3",
        params![
            requester,
            recipient,
            NotificationKind::NewFriendRequest.as_str()
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        for (_, sql) in crate::db::MIGRATIONS {
            conn.execute_batch(sql).unwrap();
        }
        conn.execute_batch(
            "INSERT INTO users (id, email, name, password_hash) VALUES
                ('a', 'a@x.io', 'Alice', 'h'),
                ('b', 'b@x.io', 'Bob', 'h');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn create_names_the_actor() {
        let conn = conn();
        create(
            &conn,
            NewNotification::new(NotificationKind::NewFriendRequest, "a", "b").friend_request("r1"),
        )
        .unwrap();

        let unread = unread_for(&conn, "b").unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].body, "Alice sent you a friend request");
        assert_eq!(unread[0].type_of_notification, "new_friendrequest");
        assert_eq!(unread[0].friendrequest_id.as_deref(), Some("r1"));
        assert!(unread_for(&conn, "a").unwrap().is_empty());
    }

    #[test]
    fn mark_read_is_scoped_to_recipient() {
        let conn = conn();
        let id = create(
            &conn,
            NewNotification::new(NotificationKind::AcceptedFriendRequest, "a", "b"),
        )
        .unwrap();

        assert!(!mark_read(&conn, &id, "a").unwrap());
        assert!(mark_read(&conn, &id, "b").unwrap());
        assert!(unread_for(&conn, "b").unwrap().is_empty());
    }

    #[test]
    fn mark_all_read_counts_only_unread() {
        let conn = conn();
        for _ in 0..3 {
            create(&conn, NewNotification::new(NotificationKind::PostLike, "a", "b")).unwrap();
        }
        assert_eq!(mark_all_read(&conn, "b").unwrap(), 3);
        assert_eq!(mark_all_read(&conn, "b").unwrap(), 0);
    }

    #[test]
    fn delete_friend_request_notices_leaves_other_kinds() {
        let conn = conn();
        create(&conn, NewNotification::new(NotificationKind::NewFriendRequest, "a", "b")).unwrap();
        create(&conn, NewNotification::new(NotificationKind::PostLike, "a", "b")).unwrap();

        assert_eq!(delete_friend_request_notices(&conn, "a", "b").unwrap(), 1);
        let left = unread_for(&conn, "b").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].type_of_notification, "post_like");
    }
}
