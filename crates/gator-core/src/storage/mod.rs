mod database;
mod feed_repo;
mod follow_repo;
mod post_repo;
mod store;
mod user_repo;

pub use database::Database;
pub use feed_repo::FeedRepository;
pub use follow_repo::FeedFollowRepository;
pub use post_repo::PostRepository;
pub use store::FeedStore;
pub use user_repo::UserRepository;
