pub mod addfeed;
pub mod agg;
pub mod browse;
pub mod feeds;
pub mod follow;
pub mod following;
pub mod login;
pub mod register;
pub mod reset;
pub mod users;

use anyhow::Result;

use gator_core::{
    feed::User,
    storage::{Database, UserRepository},
    AppConfig, Error,
};

/// Resolve the logged-in user for commands that act on someone's behalf
pub async fn require_current_user(db: &Database, config: &AppConfig) -> Result<User> {
    let name = config
        .session
        .current_user_name
        .as_deref()
        .ok_or(Error::NotLoggedIn)?;

    Ok(UserRepository::new(db).get_by_name(name).await?)
}
