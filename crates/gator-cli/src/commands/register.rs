use anyhow::Result;

use gator_core::{
    storage::{Database, UserRepository},
    AppConfig,
};

pub async fn run(db: &Database, config: &mut AppConfig, name: &str) -> Result<()> {
    let user = UserRepository::new(db).create(name).await?;
    config.set_current_user(&user.name)?;

    println!("User created: {}", user.name);
    println!("  ID: {}", user.id);
    println!("  Created: {}", user.created_at.format("%Y-%m-%d %H:%M"));

    Ok(())
}
