use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account that owns and follows feeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents an RSS feed subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    /// `None` until the scheduler claims the feed for the first time
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new feed
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
}

/// A feed together with the name of the user who added it
#[derive(Debug, Clone)]
pub struct FeedWithOwner {
    pub feed: Feed,
    pub owner_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedFollow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents an entry discovered in a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Unique across all posts
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new post
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl Feed {
    /// Check if the scheduler has ever claimed this feed
    pub fn is_polled(&self) -> bool {
        self.last_fetched_at.is_some()
    }
}

impl Post {
    /// Get a preview of the description (first N characters)
    pub fn description_preview(&self, max_len: usize) -> String {
        let text = self.description.as_deref().unwrap_or("");

        if max_len == 0 {
            return String::new();
        }

        if text.chars().count() <= max_len {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max_len).collect();
            format!("{}...", truncated)
        }
    }
}
