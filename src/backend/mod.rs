pub mod commands;
pub mod config;
pub mod discord;
pub mod followers;
pub mod oauth;
pub mod storage;
pub mod twitch;

#[cfg(test)]
pub mod testing;
