//! Follow-graph rules independent of storage.

/// What a follow request should do given the current state of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDecision {
    Create,
    AlreadyFollowing,
    SelfFollow,
}

/// Decide whether `actor_id` may start following `author_id`.
///
/// Self-follow wins over an existing edge so a corrupted row never makes a
/// user appear to follow themselves.
pub fn decide_follow(actor_id: i64, author_id: i64, already_following: bool) -> FollowDecision {
    if actor_id == author_id {
        FollowDecision::SelfFollow
    } else if already_following {
        FollowDecision::AlreadyFollowing
    } else {
        FollowDecision::Create
    }
}

/// Whether the profile page should offer an unfollow button.
pub fn shows_following(viewer_id: Option<i64>, author_id: i64, edge_exists: bool) -> bool {
    match viewer_id {
        Some(viewer) if viewer != author_id => edge_exists,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_follow_is_rejected_even_with_existing_edge() {
        assert_eq!(decide_follow(7, 7, false), FollowDecision::SelfFollow);
        assert_eq!(decide_follow(7, 7, true), FollowDecision::SelfFollow);
    }

    #[test]
    fn existing_edge_is_not_duplicated() {
        assert_eq!(decide_follow(1, 2, true), FollowDecision::AlreadyFollowing);
        assert_eq!(decide_follow(1, 2, false), FollowDecision::Create);
    }

    #[test]
    fn anonymous_and_self_never_show_following() {
        assert!(!shows_following(None, 3, true));
        assert!(!shows_following(Some(3), 3, true));
        assert!(shows_following(Some(4), 3, true));
        assert!(!shows_following(Some(4), 3, false));
    }
}
