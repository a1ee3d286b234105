use serde::Deserialize;
use std::path::Path;

use super::{FollowerRecord, Result, Stores};
use crate::backend::twitch::TokenPair;

pub const LEGACY_TOKENS_FILE: &str = ".tokens.json";
pub const LEGACY_FOLLOWERS_FILE: &str = "lastFollowerList.json";

/// Legacy follower snapshots were written either as a bare list or wrapped
/// together with the total count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyFollowerList {
    Wrapped { followers: Vec<FollowerRecord> },
    Bare(Vec<FollowerRecord>),
}

impl LegacyFollowerList {
    fn into_followers(self) -> Vec<FollowerRecord> {
        match self {
            LegacyFollowerList::Wrapped { followers } => followers,
            LegacyFollowerList::Bare(followers) => followers,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub tokens_migrated: bool,
    pub followers_migrated: usize,
}

/// Import `.tokens.json` and `lastFollowerList.json` from `dir` into the
/// configured stores. Missing files are skipped. An imported follower list
/// counts as the initial snapshot, so its followers are not announced again.
pub async fn migrate_legacy_files(
    dir: &Path,
    broadcaster_id: &str,
    stores: &Stores,
) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    let followers_path = dir.join(LEGACY_FOLLOWERS_FILE);
    if followers_path.exists() {
        log::info!("Migrating {}...", LEGACY_FOLLOWERS_FILE);
        let content = tokio::fs::read_to_string(&followers_path).await?;
        let followers = serde_json::from_str::<LegacyFollowerList>(&content)?.into_followers();
        stores.followers.upsert_followers(&followers).await?;
        stores.followers.mark_seeded().await?;
        report.followers_migrated = followers.len();
    }

    let tokens_path = dir.join(LEGACY_TOKENS_FILE);
    if tokens_path.exists() {
        log::info!("Migrating {}...", LEGACY_TOKENS_FILE);
        let content = tokio::fs::read_to_string(&tokens_path).await?;
        let pair: TokenPair = serde_json::from_str(&content)?;
        if pair.is_set() {
            stores.tokens.upsert_token(broadcaster_id, &pair).await?;
            report.tokens_migrated = true;
        } else {
            log::warn!("{} holds no usable tokens, skipping", LEGACY_TOKENS_FILE);
        }
    }

    if report == MigrationReport::default() {
        log::info!("No migration files found");
    }

    Ok(report)
}
