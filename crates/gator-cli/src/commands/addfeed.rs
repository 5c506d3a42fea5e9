use anyhow::Result;

use gator_core::{
    feed::{validate_feed_url, NewFeed},
    storage::{Database, FeedFollowRepository, FeedRepository},
    AppConfig,
};

use super::require_current_user;

pub async fn run(db: &Database, config: &AppConfig, name: &str, url: &str) -> Result<()> {
    let user = require_current_user(db, config).await?;
    let url = validate_feed_url(url)?;

    let feed = FeedRepository::new(db)
        .create(&NewFeed {
            name: name.to_string(),
            url,
            user_id: user.id,
        })
        .await?;
    println!("Feed added: {} ({})", feed.name, feed.id);
    println!("  URL: {}", feed.url);

    // The creator follows their own feed
    FeedFollowRepository::new(db).create(user.id, feed.id).await?;
    println!("{} now follows {}", user.name, feed.name);

    Ok(())
}
