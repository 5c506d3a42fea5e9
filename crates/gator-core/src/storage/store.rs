use chrono::Utc;
use uuid::Uuid;

use super::{Database, FeedRepository, PostRepository};
use crate::feed::{Feed, NewPost, Post};
use crate::Result;

/// The persistence operations the aggregation engine depends on.
///
/// Implementations must report a duplicate post URL as
/// [`Error::PostConflict`](crate::Error::PostConflict) and keep every other
/// failure distinguishable from it.
#[async_trait::async_trait]
pub trait FeedStore: Send + Sync {
    /// The feed with the oldest `last_fetched_at`; never-fetched feeds first
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>>;

    /// Claim a feed by stamping `last_fetched_at` with the current time
    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()>;

    async fn create_post(&self, new_post: &NewPost) -> Result<Post>;
}

#[async_trait::async_trait]
impl FeedStore for Database {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        FeedRepository::new(self).next_to_fetch().await
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()> {
        FeedRepository::new(self).mark_fetched(feed_id, Utc::now()).await
    }

    async fn create_post(&self, new_post: &NewPost) -> Result<Post> {
        PostRepository::new(self).create(new_post).await
    }
}
