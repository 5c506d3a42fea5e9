use anyhow::Result;

use gator_core::{
    feed::validate_feed_url,
    storage::{Database, FeedFollowRepository, FeedRepository},
    AppConfig, Error,
};

use super::require_current_user;

pub async fn run(db: &Database, config: &AppConfig, url: &str) -> Result<()> {
    let user = require_current_user(db, config).await?;
    let url = validate_feed_url(url)?;

    let feed = FeedRepository::new(db)
        .find_by_url(&url)
        .await?
        .ok_or_else(|| Error::FeedNotFound(url.clone()))?;

    match FeedFollowRepository::new(db).create(user.id, feed.id).await? {
        Some(_) => println!("{} now follows {}", user.name, feed.name),
        None => println!("{} already follows {}", user.name, feed.name),
    }

    Ok(())
}
