use std::collections::HashSet;

use crate::backend::storage::FollowerRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowerEvent {
    Followed(FollowerRecord),
    Unfollowed(FollowerRecord),
}

impl FollowerEvent {
    pub fn follower(&self) -> &FollowerRecord {
        match self {
            FollowerEvent::Followed(follower) | FollowerEvent::Unfollowed(follower) => follower,
        }
    }
}

/// Compare the persisted snapshot with a fresh listing, keyed by `user_id`.
///
/// New followers come first, in listing order, followed by the lost ones in
/// snapshot order.
pub fn diff_followers(previous: &[FollowerRecord], current: &[FollowerRecord]) -> Vec<FollowerEvent> {
    let known: HashSet<&str> = previous.iter().map(|f| f.user_id.as_str()).collect();
    let listed: HashSet<&str> = current.iter().map(|f| f.user_id.as_str()).collect();

    let followed = current
        .iter()
        .filter(|f| !known.contains(f.user_id.as_str()))
        .cloned()
        .map(FollowerEvent::Followed);
    let unfollowed = previous
        .iter()
        .filter(|f| !listed.contains(f.user_id.as_str()))
        .cloned()
        .map(FollowerEvent::Unfollowed);

    followed.chain(unfollowed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::follower;

    #[test]
    fn test_one_follow_one_unfollow() {
        let previous = vec![follower("a", "A"), follower("b", "B")];
        let current = vec![follower("b", "B"), follower("c", "C")];

        assert_eq!(
            diff_followers(&previous, &current),
            vec![
                FollowerEvent::Followed(follower("c", "C")),
                FollowerEvent::Unfollowed(follower("a", "A")),
            ]
        );
    }

    #[test]
    fn test_renamed_follower_is_not_a_change() {
        let previous = vec![follower("a", "Old")];
        let current = vec![follower("a", "New")];
        assert!(diff_followers(&previous, &current).is_empty());
    }

    #[test]
    fn test_everyone_left() {
        let previous = vec![follower("a", "A"), follower("b", "B")];
        let events = diff_followers(&previous, &[]);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, FollowerEvent::Unfollowed(_))));
    }
}
