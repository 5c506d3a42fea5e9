use anyhow::Result;

use gator_core::{
    storage::{Database, FeedFollowRepository},
    AppConfig,
};

use super::require_current_user;

pub async fn run(db: &Database, config: &AppConfig) -> Result<()> {
    let user = require_current_user(db, config).await?;
    let feeds = FeedFollowRepository::new(db).list_feeds_for_user(user.id).await?;

    if feeds.is_empty() {
        println!("{} does not follow any feeds.", user.name);
        return Ok(());
    }

    println!("{} follows:", user.name);
    for feed in &feeds {
        println!("* {}", feed.name);
    }

    Ok(())
}
