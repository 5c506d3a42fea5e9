use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::database::is_unique_violation;
use super::Database;
use crate::feed::{Feed, FeedWithOwner, NewFeed};
use crate::{Error, Result};

/// Repository for feed CRUD operations
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
pub(super) struct FeedRow {
    id: String,
    name: String,
    url: String,
    user_id: String,
    last_fetched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct FeedWithOwnerRow {
    #[sqlx(flatten)]
    feed: FeedRow,
    owner_name: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            url: row.url,
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            last_fetched_at: row.last_fetched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a new feed owned by `new_feed.user_id`
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_feed.name)
        .bind(&new_feed.url)
        .bind(new_feed.user_id.to_string())
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::FeedExists(new_feed.url.clone())
            } else {
                Error::Database(e)
            }
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            Error::FeedNotFound(id.to_string())
        })
    }

    /// Find a feed by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, created_at, updated_at
            FROM feeds
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Find a feed by URL
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, created_at, updated_at
            FROM feeds
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Get all feeds with the name of the user who added them
    pub async fn list_with_owners(&self) -> Result<Vec<FeedWithOwner>> {
        let rows: Vec<FeedWithOwnerRow> = sqlx::query_as(
            r#"
            SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at, f.created_at, f.updated_at,
                   u.name AS owner_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.name ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedWithOwner {
                feed: Feed::from(row.feed),
                owner_name: row.owner_name,
            })
            .collect())
    }

    /// The stalest feed: never-fetched feeds first, then oldest `last_fetched_at`
    pub async fn next_to_fetch(&self) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, created_at, updated_at
            FROM feeds
            ORDER BY last_fetched_at IS NOT NULL, last_fetched_at ASC, created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Stamp the feed as fetched at `at`.
    ///
    /// `last_fetched_at` never moves backwards: an older `at` leaves the row
    /// untouched.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?,
                updated_at = ?
            WHERE id = ?
              AND (last_fetched_at IS NULL OR last_fetched_at <= ?)
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(id.to_string())
        .bind(at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 && self.find_by_id(id).await?.is_none() {
            return Err(Error::FeedNotFound(id.to_string()));
        }

        Ok(())
    }

    /// Get total feed count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}
