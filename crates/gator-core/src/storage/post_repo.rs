use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::database::is_unique_violation;
use super::Database;
use crate::feed::{NewPost, Post};
use crate::{Error, Result};

/// Repository for posts discovered by the aggregator
pub struct PostRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct PostRow {
    id: String,
    feed_id: String,
    title: String,
    description: Option<String>,
    url: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            feed_id: Uuid::parse_str(&row.feed_id).unwrap_or_default(),
            title: row.title,
            description: row.description,
            url: row.url,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> PostRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a post.
    ///
    /// A post whose URL is already stored fails with [`Error::PostConflict`];
    /// every other failure stays [`Error::Database`].
    pub async fn create(&self, new_post: &NewPost) -> Result<Post> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO posts
            (id, feed_id, title, description, url, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(new_post.feed_id.to_string())
        .bind(&new_post.title)
        .bind(&new_post.description)
        .bind(&new_post.url)
        .bind(new_post.published_at)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::PostConflict(new_post.url.clone())
            } else {
                Error::Database(e)
            }
        })?;

        Ok(Post {
            id,
            feed_id: new_post.feed_id,
            title: new_post.title.clone(),
            description: new_post.description.clone(),
            url: new_post.url.clone(),
            published_at: new_post.published_at,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            SELECT id, feed_id, title, description, url, published_at, created_at, updated_at
            FROM posts
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Post::from))
    }

    /// Get posts for a feed, newest first
    pub async fn list_by_feed(&self, feed_id: Uuid) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT id, feed_id, title, description, url, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, created_at DESC
            "#,
        )
        .bind(feed_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Newest posts from the feeds a user follows
    pub async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.feed_id, p.title, p.description, p.url, p.published_at,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at IS NULL, p.published_at DESC, p.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NewFeed;
    use crate::storage::{FeedFollowRepository, FeedRepository, UserRepository};
    use chrono::TimeZone;

    async fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db).create("reader").await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Blog".to_string(),
                url: "https://blog.example.com/rss".to_string(),
                user_id: user.id,
            })
            .await
            .unwrap();
        (db, user.id, feed.id)
    }

    fn new_post(feed_id: Uuid, slug: &str, day: u32) -> NewPost {
        NewPost {
            feed_id,
            title: slug.to_string(),
            description: None,
            url: format!("https://blog.example.com/{}", slug),
            published_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (db, _, feed_id) = setup().await;
        let repo = PostRepository::new(&db);

        let post = repo.create(&new_post(feed_id, "hello", 1)).await.unwrap();
        let found = repo.find_by_url(&post.url).await.unwrap().unwrap();
        assert_eq!(found.id, post.id);
        assert_eq!(found.published_at, post.published_at);
    }

    #[tokio::test]
    async fn test_duplicate_url_is_conflict() {
        let (db, _, feed_id) = setup().await;
        let repo = PostRepository::new(&db);

        repo.create(&new_post(feed_id, "hello", 1)).await.unwrap();
        let err = repo.create(&new_post(feed_id, "hello", 2)).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_feed_is_not_a_conflict() {
        let (db, _, _) = setup().await;
        let err = PostRepository::new(&db)
            .create(&new_post(Uuid::new_v4(), "orphan", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_list_for_user_only_followed_newest_first() {
        let (db, user_id, feed_id) = setup().await;
        let repo = PostRepository::new(&db);

        repo.create(&new_post(feed_id, "old", 1)).await.unwrap();
        repo.create(&new_post(feed_id, "new", 3)).await.unwrap();
        repo.create(&new_post(feed_id, "mid", 2)).await.unwrap();

        assert!(repo.list_for_user(user_id, 10).await.unwrap().is_empty());

        FeedFollowRepository::new(&db).create(user_id, feed_id).await.unwrap();

        let titles: Vec<String> = repo
            .list_for_user(user_id, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid"]);
        assert_eq!(repo.list_by_feed(feed_id).await.unwrap().len(), 3);
    }
}
