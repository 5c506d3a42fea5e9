mod fetcher;
mod models;
mod parser;

pub use fetcher::{validate_feed_url, FeedFetcher, CLIENT_USER_AGENT};
pub use models::{Feed, FeedFollow, FeedWithOwner, NewFeed, NewPost, Post, User};
pub use parser::{parse_feed, unescape_html, FeedDocument, FeedItem};
