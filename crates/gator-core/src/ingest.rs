use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::feed::{FeedDocument, FeedItem, NewPost};
use crate::shutdown::is_shutdown;
use crate::storage::FeedStore;

/// RFC 1123 with a numeric zone, after the `Mon, ` weekday prefix
pub const PUB_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Outcome of ingesting one document
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Posts stored for the first time
    pub created: u32,
    /// Items whose URL was already stored
    pub duplicates: u32,
    /// Items skipped because the store rejected them for another reason
    pub failed: u32,
}

/// Parse a `<pubDate>` such as `Mon, 02 Jan 2006 15:04:05 -0700`.
///
/// The weekday must be a valid abbreviation but is not checked against the
/// date. Anything else yields `None`.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let (weekday, rest) = raw.trim().split_once(", ")?;
    if !WEEKDAYS.contains(&weekday) {
        return None;
    }

    DateTime::parse_from_str(rest, PUB_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_new_post(feed_id: Uuid, item: &FeedItem) -> NewPost {
    let published_at = parse_pub_date(&item.pub_date);
    if published_at.is_none() && !item.pub_date.trim().is_empty() {
        tracing::debug!("Unparseable pubDate {:?} for {}", item.pub_date, item.link);
    }

    let description = if item.description.trim().is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    NewPost {
        feed_id,
        title: item.title.clone(),
        description,
        url: item.link.clone(),
        published_at,
    }
}

/// Persists feed items as posts, one insert per item
pub struct Ingestor {
    store: Arc<dyn FeedStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }

    /// Store every item of `document` under `feed_id`, in document order.
    ///
    /// Duplicate URLs are counted, not reported. Any other per-item failure is
    /// logged and the remaining items are still processed. Shutdown is checked
    /// between items only.
    pub async fn ingest(
        &self,
        feed_id: Uuid,
        document: &FeedDocument,
        shutdown: &watch::Receiver<bool>,
    ) -> IngestStats {
        let mut stats = IngestStats::default();

        for item in &document.items {
            if is_shutdown(shutdown) {
                tracing::debug!("Ingest of feed {} interrupted by shutdown", feed_id);
                break;
            }

            if item.link.trim().is_empty() {
                tracing::warn!("Skipping item {:?} in feed {}: no link", item.title, feed_id);
                stats.failed += 1;
                continue;
            }

            let new_post = to_new_post(feed_id, item);

            match self.store.create_post(&new_post).await {
                Ok(post) => {
                    tracing::debug!("Stored post '{}' ({})", post.title, post.url);
                    stats.created += 1;
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!("Post already stored: {}", new_post.url);
                    stats.duplicates += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to store post {}: {}", new_post.url, e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Feed, NewFeed, Post};
    use crate::storage::{Database, FeedRepository, PostRepository, UserRepository};
    use crate::{Error, Result};
    use chrono::TimeZone;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db).create("reader").await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Journal".to_string(),
                url: "https://journal.example.com/rss".to_string(),
                user_id: user.id,
            })
            .await
            .unwrap();
        (db, feed.id)
    }

    fn item(slug: &str, pub_date: &str) -> FeedItem {
        FeedItem {
            title: format!("Post {}", slug),
            link: format!("https://journal.example.com/{}", slug),
            description: format!("About {}", slug),
            pub_date: pub_date.to_string(),
        }
    }

    fn document(items: Vec<FeedItem>) -> FeedDocument {
        FeedDocument {
            title: "Journal".to_string(),
            items,
            ..Default::default()
        }
    }

    fn running() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        std::mem::forget(tx);
        rx
    }

    #[test]
    fn test_parse_pub_date() {
        let parsed = parse_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap());

        assert!(parse_pub_date("2006-01-02T15:04:05Z").is_none());
        assert!(parse_pub_date("Mon, 02 Jan 2006 15:04:05 MST").is_none());
        assert!(parse_pub_date("").is_none());
    }

    #[test]
    fn test_parse_pub_date_ignores_wrong_weekday() {
        let expected = Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap();
        assert_eq!(parse_pub_date("Tue, 02 Jan 2006 15:04:05 -0700"), Some(expected));

        assert!(parse_pub_date("Xyz, 02 Jan 2006 15:04:05 -0700").is_none());
        assert!(parse_pub_date("Monday, 02 Jan 2006 15:04:05 -0700").is_none());
        assert!(parse_pub_date("02 Jan 2006 15:04:05 -0700").is_none());
    }

    #[tokio::test]
    async fn test_ingest_stores_items_in_order() {
        let (db, feed_id) = setup().await;
        let ingestor = Ingestor::new(Arc::new(db.clone()));

        let doc = document(vec![
            item("a", "Mon, 02 Jan 2006 15:04:05 -0700"),
            item("b", "Tue, 10 Jun 2003 04:00:00 +0000"),
        ]);
        let stats = ingestor.ingest(feed_id, &doc, &running()).await;

        assert_eq!(stats, IngestStats { created: 2, duplicates: 0, failed: 0 });
        let post = PostRepository::new(&db)
            .find_by_url("https://journal.example.com/b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.title, "Post b");
        assert_eq!(post.description.as_deref(), Some("About b"));
        assert_eq!(
            post.published_at,
            Some(Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_existing_url_is_a_silent_duplicate() {
        let (db, feed_id) = setup().await;
        PostRepository::new(&db)
            .create(&NewPost {
                feed_id,
                title: "Known".to_string(),
                description: None,
                url: "https://journal.example.com/b".to_string(),
                published_at: None,
            })
            .await
            .unwrap();

        let ingestor = Ingestor::new(Arc::new(db.clone()));
        let doc = document(vec![item("a", ""), item("b", ""), item("c", "")]);
        let stats = ingestor.ingest(feed_id, &doc, &running()).await;

        assert_eq!(stats, IngestStats { created: 2, duplicates: 1, failed: 0 });
        assert_eq!(PostRepository::new(&db).count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ingest_twice_is_idempotent() {
        let (db, feed_id) = setup().await;
        let ingestor = Ingestor::new(Arc::new(db.clone()));
        let doc = document(vec![item("a", ""), item("b", ""), item("c", "")]);

        let post_ids = || async {
            let mut ids: Vec<Uuid> = PostRepository::new(&db)
                .list_by_feed(feed_id)
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect();
            ids.sort();
            ids
        };

        let first = ingestor.ingest(feed_id, &doc, &running()).await;
        let before = post_ids().await;

        let second = ingestor.ingest(feed_id, &doc, &running()).await;
        let after = post_ids().await;

        assert_eq!(first.created, 3);
        assert_eq!(second, IngestStats { created: 0, duplicates: 3, failed: 0 });
        assert_eq!(before.len(), 3);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_malformed_date_still_stores_post() {
        let (db, feed_id) = setup().await;
        let ingestor = Ingestor::new(Arc::new(db.clone()));
        let doc = document(vec![
            item("bad", "yesterday-ish"),
            item("good", "Mon, 02 Jan 2006 15:04:05 -0700"),
        ]);

        let stats = ingestor.ingest(feed_id, &doc, &running()).await;
        assert_eq!(stats.created, 2);

        let posts = PostRepository::new(&db);
        let bad = posts.find_by_url("https://journal.example.com/bad").await.unwrap().unwrap();
        let good = posts.find_by_url("https://journal.example.com/good").await.unwrap().unwrap();
        assert!(bad.published_at.is_none());
        assert!(good.published_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_description_becomes_none() {
        let (db, feed_id) = setup().await;
        let ingestor = Ingestor::new(Arc::new(db.clone()));
        let mut bare = item("bare", "");
        bare.description = "  ".to_string();

        ingestor.ingest(feed_id, &document(vec![bare]), &running()).await;

        let post = PostRepository::new(&db)
            .find_by_url("https://journal.example.com/bare")
            .await
            .unwrap()
            .unwrap();
        assert!(post.description.is_none());
    }

    #[tokio::test]
    async fn test_item_without_link_is_skipped() {
        let (db, feed_id) = setup().await;
        let ingestor = Ingestor::new(Arc::new(db.clone()));
        let mut linkless = item("x", "");
        linkless.link = String::new();

        let stats = ingestor
            .ingest(feed_id, &document(vec![linkless, item("y", "")]), &running())
            .await;
        assert_eq!(stats, IngestStats { created: 1, duplicates: 0, failed: 1 });
    }

    /// Store that rejects one URL with a non-conflict error
    struct FlakyStore {
        inner: Database,
        broken_url: String,
    }

    #[async_trait::async_trait]
    impl FeedStore for FlakyStore {
        async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
            self.inner.next_feed_to_fetch().await
        }

        async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()> {
            self.inner.mark_feed_fetched(feed_id).await
        }

        async fn create_post(&self, new_post: &NewPost) -> Result<Post> {
            if new_post.url == self.broken_url {
                return Err(Error::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.create_post(new_post).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_skips_only_that_item() {
        let (db, feed_id) = setup().await;
        let store = FlakyStore {
            inner: db.clone(),
            broken_url: "https://journal.example.com/b".to_string(),
        };
        let ingestor = Ingestor::new(Arc::new(store));
        let doc = document(vec![item("a", ""), item("b", ""), item("c", "")]);

        let stats = ingestor.ingest(feed_id, &doc, &running()).await;

        assert_eq!(stats, IngestStats { created: 2, duplicates: 0, failed: 1 });
        let posts = PostRepository::new(&db);
        assert!(posts.find_by_url("https://journal.example.com/c").await.unwrap().is_some());
        assert!(posts.find_by_url("https://journal.example.com/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_between_items() {
        let (db, feed_id) = setup().await;
        let ingestor = Ingestor::new(Arc::new(db.clone()));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let stats = ingestor
            .ingest(feed_id, &document(vec![item("a", ""), item("b", "")]), &rx)
            .await;

        assert_eq!(stats, IngestStats::default());
        assert_eq!(PostRepository::new(&db).count().await.unwrap(), 0);
    }
}
