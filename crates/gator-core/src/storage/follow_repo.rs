use chrono::Utc;
use uuid::Uuid;

use super::database::is_unique_violation;
use super::feed_repo::FeedRow;
use super::Database;
use crate::feed::{Feed, FeedFollow};
use crate::Result;

/// Repository linking users to the feeds they read
pub struct FeedFollowRepository<'a> {
    db: &'a Database,
}

impl<'a> FeedFollowRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Follow a feed. Following twice is a no-op that returns `None`.
    pub async fn create(&self, user_id: Uuid, feed_id: Uuid) -> Result<Option<FeedFollow>> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(feed_id.to_string())
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(Some(FeedFollow {
                id,
                user_id,
                feed_id,
                created_at: now,
                updated_at: now,
            })),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Feeds followed by a user, by name
    pub async fn list_feeds_for_user(&self, user_id: Uuid) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at, f.created_at, f.updated_at
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY f.name ASC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }
}
