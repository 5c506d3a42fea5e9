use anyhow::Result;

use gator_core::{
    storage::{Database, PostRepository},
    AppConfig,
};

use super::require_current_user;

const PREVIEW_LEN: usize = 200;

pub async fn run(db: &Database, config: &AppConfig, limit: u32) -> Result<()> {
    let user = require_current_user(db, config).await?;
    let posts = PostRepository::new(db).list_for_user(user.id, limit).await?;

    if posts.is_empty() {
        println!("No posts yet. Run 'gator agg' to collect your feeds.");
        return Ok(());
    }

    for post in &posts {
        println!("{}", post.title);
        if let Some(published) = post.published_at {
            println!("  Published: {}", published.format("%Y-%m-%d %H:%M"));
        }
        println!("  {}", post.url);
        if post.description.is_some() {
            println!("  {}", post.description_preview(PREVIEW_LEN));
        }
        println!();
    }

    Ok(())
}
