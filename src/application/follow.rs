use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::follows::{FollowDecision, decide_follow};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
}

/// Creates and removes follow edges. Both operations are idempotent.
#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }

    pub async fn follow(
        &self,
        actor: &UserRecord,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.resolve_author(username).await?;
        let existing = if actor.id == author.id {
            false
        } else {
            self.follows.is_following(actor.id, author.id).await?
        };

        let outcome = match decide_follow(actor.id, author.id, existing) {
            FollowDecision::SelfFollow => FollowOutcome::SelfFollow,
            FollowDecision::AlreadyFollowing => FollowOutcome::AlreadyFollowing,
            // A concurrent request may have inserted the edge since the check.
            FollowDecision::Create => match self.follows.create_follow(actor.id, author.id).await? {
                true => FollowOutcome::Followed,
                false => FollowOutcome::AlreadyFollowing,
            },
        };

        match outcome {
            FollowOutcome::Followed => info!(
                target = "blogroll::follow",
                user = %actor.username,
                author = %author.username,
                "follow edge created"
            ),
            other => debug!(
                target = "blogroll::follow",
                user = %actor.username,
                author = %author.username,
                outcome = ?other,
                "follow request ignored"
            ),
        }

        Ok(outcome)
    }

    pub async fn unfollow(
        &self,
        actor: &UserRecord,
        username: &str,
    ) -> Result<UnfollowOutcome, FollowError> {
        let author = self.resolve_author(username).await?;
        let removed = self.follows.delete_follow(actor.id, author.id).await?;
        let outcome = if removed {
            UnfollowOutcome::Unfollowed
        } else {
            UnfollowOutcome::NotFollowing
        };

        debug!(
            target = "blogroll::follow",
            user = %actor.username,
            author = %author.username,
            outcome = ?outcome,
            "unfollow processed"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::CreateUserParams;
    use crate::infra::memory::MemoryRepositories;

    async fn setup() -> (FollowService, Arc<MemoryRepositories>, UserRecord, UserRecord) {
        let repos = Arc::new(MemoryRepositories::new());
        let mut users = Vec::new();
        for username in ["leo", "reader"] {
            let user = repos
                .create_user(CreateUserParams {
                    username: username.to_string(),
                    password_hash: String::new(),
                })
                .await
                .expect("create user");
            users.push(user);
        }
        let reader = users.pop().expect("reader");
        let leo = users.pop().expect("leo");
        let service = FollowService::new(repos.clone(), repos.clone());
        (service, repos, leo, reader)
    }

    #[tokio::test]
    async fn follow_twice_keeps_one_edge() {
        let (service, repos, _, reader) = setup().await;
        assert_eq!(
            service.follow(&reader, "leo").await.expect("follow"),
            FollowOutcome::Followed
        );
        assert_eq!(
            service.follow(&reader, "leo").await.expect("again"),
            FollowOutcome::AlreadyFollowing
        );
        assert_eq!(repos.count_follows().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn self_follow_creates_nothing() {
        let (service, repos, leo, _) = setup().await;
        assert_eq!(
            service.follow(&leo, "leo").await.expect("self"),
            FollowOutcome::SelfFollow
        );
        assert_eq!(repos.count_follows().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn unfollow_without_edge_is_not_an_error() {
        let (service, _, _, reader) = setup().await;
        assert_eq!(
            service.unfollow(&reader, "leo").await.expect("unfollow"),
            UnfollowOutcome::NotFollowing
        );
        service.follow(&reader, "leo").await.expect("follow");
        assert_eq!(
            service.unfollow(&reader, "leo").await.expect("unfollow"),
            UnfollowOutcome::Unfollowed
        );
    }

    #[tokio::test]
    async fn unknown_author_is_reported() {
        let (service, _, _, reader) = setup().await;
        assert!(matches!(
            service.follow(&reader, "ghost").await,
            Err(FollowError::UnknownAuthor)
        ));
    }
}
