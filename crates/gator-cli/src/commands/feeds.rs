use anyhow::Result;

use gator_core::storage::{Database, FeedRepository};

pub async fn run(db: &Database) -> Result<()> {
    let feeds = FeedRepository::new(db).list_with_owners().await?;

    if feeds.is_empty() {
        println!("No feeds yet.");
        println!("\nTo add one, run:");
        println!("  gator addfeed <name> <url>");
        return Ok(());
    }

    println!("Feeds ({}):\n", feeds.len());

    for entry in &feeds {
        println!("  {} (added by {})", entry.feed.name, entry.owner_name);
        println!("    URL: {}", entry.feed.url);
        match entry.feed.last_fetched_at {
            Some(last) => println!("    Last fetched: {}", last.format("%Y-%m-%d %H:%M")),
            None => println!("    Last fetched: never"),
        }
        println!();
    }

    Ok(())
}
