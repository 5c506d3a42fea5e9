use anyhow::Result;

use gator_core::{
    storage::{Database, UserRepository},
    AppConfig,
};

pub async fn run(db: &Database, config: &mut AppConfig, name: &str) -> Result<()> {
    let user = UserRepository::new(db).get_by_name(name).await?;
    config.set_current_user(&user.name)?;

    println!("Logged in as {}", user.name);
    Ok(())
}
