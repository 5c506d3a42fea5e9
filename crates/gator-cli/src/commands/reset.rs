use anyhow::Result;

use gator_core::storage::{Database, UserRepository};

pub async fn run(db: &Database) -> Result<()> {
    let deleted = UserRepository::new(db).delete_all().await?;
    println!("Database reset: {} users removed", deleted);
    Ok(())
}
