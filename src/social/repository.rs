// Repository for the social graph - friendship requests, friend edges,
// suggestions and the conversations tied to them
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;

use crate::db::models::{FriendshipRequestView, UserView, USER_VIEW_COLUMNS};
use crate::notifications::{self, NewNotification, NotificationKind};
use crate::social::domain::*;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Social(#[from] SocialError),

    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    /// Create a pending request unless the pair is already linked.
    async fn send_request(
        &self,
        from: &str,
        to: &str,
        message: &str,
    ) -> Result<SendOutcome, RepositoryError>;

    /// Accept or reject the pending request `requester` sent to `recipient`.
    async fn respond(
        &self,
        recipient: &str,
        requester: &str,
        decision: Decision,
    ) -> Result<(), RepositoryError>;

    /// Break the friendship between `user` and `friend` in both directions.
    async fn remove_friend(&self, user: &str, friend: &str) -> Result<(), RepositoryError>;

    async fn friends_of(&self, user: &str) -> Result<Vec<UserView>, RepositoryError>;

    /// Requests still waiting on `user`'s answer.
    async fn pending_for(&self, user: &str) -> Result<Vec<FriendshipRequestView>, RepositoryError>;

    async fn suggestions_for(&self, user: &str) -> Result<Vec<UserView>, RepositoryError>;

    async fn relationship(&self, viewer: &str, other: &str)
        -> Result<Relationship, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteFriendshipRepository {
    pool: DbPool,
}

impl SqliteFriendshipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FriendshipRepository for SqliteFriendshipRepository {
    async fn send_request(
        &self,
        from: &str,
        to: &str,
        message: &str,
    ) -> Result<SendOutcome, RepositoryError> {
        if from == to {
            return Err(SocialError::SelfRequest.into());
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, to)? {
            return Err(SocialError::UserNotFound.into());
        }
        if are_friends(&tx, from, to)? {
            return Ok(SendOutcome::AlreadyFriends);
        }
        if request_between(&tx, from, to, Some(RequestStatus::Sent))? {
            return Ok(SendOutcome::AlreadyPending);
        }

        let request_id = uuid::Uuid::now_v7().to_string();
        tx.execute(
            "INSERT INTO friendship_requests (id, created_by, created_for, status, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request_id,
                from,
                to,
                RequestStatus::Sent.as_str(),
                truncate_message(message)
            ],
        )?;
        notifications::create(
            &tx,
            NewNotification::new(NotificationKind::NewFriendRequest, from, to)
                .friend_request(&request_id),
        )?;
        tx.commit()?;

        tracing::info!(%from, %to, "Friendship request sent");
        Ok(SendOutcome::Created { request_id })
    }

    async fn respond(
        &self,
        recipient: &str,
        requester: &str,
        decision: Decision,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, requester)? {
            return Err(SocialError::UserNotFound.into());
        }
        let request_id: String = tx
            .query_row(
                "SELECT id FROM friendship_requests
                 WHERE created_by = ?1 AND created_for = ?2 AND status = ?3",
                params![requester, recipient, RequestStatus::Sent.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(SocialError::RequestNotFound)?;

        match decision {
            Decision::Accept => {
                tx.execute(
                    "UPDATE friendship_requests SET status = ?1 WHERE id = ?2",
                    params![RequestStatus::Accepted.as_str(), request_id],
                )?;
                let added = tx.execute(
                    "INSERT OR IGNORE INTO friendships (user_id, friend_id)
                     VALUES (?1, ?2), (?2, ?1)",
                    params![requester, recipient],
                )?;
                if added > 0 {
                    tx.execute(
                        "UPDATE users SET friends_count = friends_count + 1
                         WHERE id IN (?1, ?2)",
                        params![requester, recipient],
                    )?;
                }
                notifications::create(
                    &tx,
                    NewNotification::new(
                        NotificationKind::AcceptedFriendRequest,
                        recipient,
                        requester,
                    )
                    .friend_request(&request_id),
                )?;
                ensure_conversation(&tx, requester, recipient)?;
                refresh_suggestions(&tx, requester)?;
                refresh_suggestions(&tx, recipient)?;
                tx.commit()?;
                tracing::info!(%requester, %recipient, "Friendship request accepted");
            }
            Decision::Reject => {
                notifications::delete_friend_request_notices(&tx, requester, recipient)?;
                notifications::create(
                    &tx,
                    NewNotification::new(
                        NotificationKind::RejectedFriendRequest,
                        recipient,
                        requester,
                    )
                    .friend_request(&request_id),
                )?;
                tx.execute(
                    "DELETE FROM friendship_requests WHERE id = ?1",
                    params![request_id],
                )?;
                tx.commit()?;
                tracing::info!(%requester, %recipient, "Friendship request rejected");
            }
        }

        Ok(())
    }

    async fn remove_friend(&self, user: &str, friend: &str) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, friend)? {
            return Err(SocialError::UserNotFound.into());
        }
        if !are_friends(&tx, user, friend)? {
            return Err(SocialError::NotFriends.into());
        }

        tx.execute(
            "DELETE FROM friendships
             WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
            params![user, friend],
        )?;
        tx.execute(
            "DELETE FROM friend_suggestions
             WHERE (user_id = ?1 AND suggested_id = ?2) OR (user_id = ?2 AND suggested_id = ?1)",
            params![user, friend],
        )?;
        tx.execute(
            "UPDATE users SET friends_count = MAX(friends_count - 1, 0) WHERE id IN (?1, ?2)",
            params![user, friend],
        )?;
        tx.execute(
            "DELETE FROM friendship_requests
             WHERE (created_by = ?1 AND created_for = ?2) OR (created_by = ?2 AND created_for = ?1)",
            params![user, friend],
        )?;
        tx.commit()?;
        tracing::info!(%user, %friend, "Friendship removed");

        // The friendship is gone either way; a stale conversation is only logged.
        if let Err(e) = delete_conversations_between(&conn, user, friend) {
            tracing::warn!(%user, %friend, "Failed to delete conversation: {}", e);
        }

        Ok(())
    }

    async fn friends_of(&self, user: &str) -> Result<Vec<UserView>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM friendships f JOIN users u ON u.id = f.friend_id
             WHERE f.user_id = ?1 ORDER BY u.name",
            USER_VIEW_COLUMNS
        );
        Ok(UserView::list(&conn, &sql, params![user])?)
    }

    async fn pending_for(&self, user: &str) -> Result<Vec<FriendshipRequestView>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT r.id, r.message, r.status, r.created_at, {}
             FROM friendship_requests r JOIN users u ON u.id = r.created_by
             WHERE r.created_for = ?1 AND r.status = ?2
             ORDER BY r.created_at DESC",
            USER_VIEW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let requests = stmt
            .query_map(params![user, RequestStatus::Sent.as_str()], |row| {
                Ok(FriendshipRequestView {
                    id: row.get(0)?,
                    message: row.get(1)?,
                    status: row.get(2)?,
                    created_at: row.get(3)?,
                    created_by: UserView::from_row_at(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    async fn suggestions_for(&self, user: &str) -> Result<Vec<UserView>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM friend_suggestions s JOIN users u ON u.id = s.suggested_id
             WHERE s.user_id = ?1 ORDER BY u.name",
            USER_VIEW_COLUMNS
        );
        Ok(UserView::list(&conn, &sql, params![user])?)
    }

    async fn relationship(
        &self,
        viewer: &str,
        other: &str,
    ) -> Result<Relationship, RepositoryError> {
        let conn = self.pool.get()?;
        let is_friend = are_friends(&conn, viewer, other)?;
        let request_exists = request_between(&conn, viewer, other, None)?;
        Ok(Relationship::evaluate(
            viewer == other,
            is_friend,
            request_exists,
        ))
    }
}

// -- Query helpers, usable inside a transaction --

fn user_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

fn are_friends(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
        params![a, b],
        |row| row.get(0),
    )
}

/// Whether a request exists in either direction, optionally with a given status.
fn request_between(
    conn: &Connection,
    a: &str,
    b: &str,
    status: Option<RequestStatus>,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM friendship_requests
         WHERE ((created_by = ?1 AND created_for = ?2) OR (created_by = ?2 AND created_for = ?1))
           AND (?3 IS NULL OR status = ?3)",
        params![a, b, status.map(|s| s.as_str())],
        |row| row.get(0),
    )
}

/// Conversations whose members include both users.
const SHARED_CONVERSATIONS: &str = "SELECT conversation_id FROM conversation_users
     WHERE user_id IN (?1, ?2)
     GROUP BY conversation_id
     HAVING COUNT(DISTINCT user_id) = 2";

fn ensure_conversation(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<()> {
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS ({})", SHARED_CONVERSATIONS),
        params![a, b],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(());
    }
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute("INSERT INTO conversations (id) VALUES (?1)", params![id])?;
    conn.execute(
        "INSERT INTO conversation_users (conversation_id, user_id) VALUES (?1, ?2), (?1, ?3)",
        params![id, a, b],
    )?;
    Ok(())
}

fn delete_conversations_between(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("DELETE FROM conversations WHERE id IN ({})", SHARED_CONVERSATIONS),
        params![a, b],
    )
}

/// Rebuild `user`'s suggestions as friends of friends who aren't friends yet.
fn refresh_suggestions(conn: &Connection, user: &str) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM friend_suggestions WHERE user_id = ?1",
        params![user],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO friend_suggestions (user_id, suggested_id)
         SELECT DISTINCT ?1, f2.friend_id
         FROM friendships f1
         JOIN friendships f2 ON f2.user_id = f1.friend_id
         WHERE f1.user_id = ?1
           AND f2.friend_id != ?1
           AND f2.friend_id NOT IN (SELECT friend_id FROM friendships WHERE user_id = ?1)",
        params![user],
    )?;
    Ok(())
}
