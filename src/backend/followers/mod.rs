/// Follower announcements: a pure diff between the stored snapshot and a
/// fresh listing, and the loop that posts the differences to Discord
mod diff;
mod watcher;

pub use diff::{diff_followers, FollowerEvent};
pub use watcher::{
    announcement, FollowerAnnouncer, FollowerError, FollowerWatcher, TickReport, WebhookAnnouncer,
};
