//! In-process repositories used when no database is configured and by tests.
//!
//! Uniqueness and referential rules mirror the Postgres schema so callers see
//! the same `RepoError` variants from either backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GROUP_SLUG_UNIQUE_CONSTRAINT, GroupsRepo, HealthRepo, PostListScope, PostsRepo,
    RepoError, SessionsRepo, USERNAME_UNIQUE_CONSTRAINT, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{
    AuthorRef, CommentRecord, CommentWithAuthor, FollowRecord, GroupRecord, GroupRef, PostRecord,
    PostWithRelations, SessionRecord, UserRecord,
};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    users: BTreeMap<i64, UserRecord>,
    groups: BTreeMap<i64, GroupRecord>,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    follows: BTreeMap<i64, FollowRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_user(&self, id: i64) -> Result<&UserRecord, RepoError> {
        self.users.get(&id).ok_or_else(|| RepoError::InvalidInput {
            message: format!("user {id} does not exist"),
        })
    }

    fn require_group(&self, id: Option<i64>) -> Result<(), RepoError> {
        match id {
            Some(id) if !self.groups.contains_key(&id) => Err(RepoError::InvalidInput {
                message: format!("group {id} does not exist"),
            }),
            _ => Ok(()),
        }
    }

    fn is_following(&self, user_id: i64, author_id: i64) -> bool {
        self.follows
            .values()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
    }

    fn in_scope(&self, post: &PostRecord, scope: PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(group_id) => post.group_id == Some(group_id),
            PostListScope::Author(author_id) => post.author_id == author_id,
            PostListScope::FollowedBy(user_id) => self.is_following(user_id, post.author_id),
        }
    }

    fn with_relations(&self, post: &PostRecord) -> Result<PostWithRelations, RepoError> {
        let author = self.users.get(&post.author_id).ok_or_else(|| RepoError::Integrity {
            message: format!("post {} references a missing author", post.id),
        })?;
        let group = post
            .group_id
            .and_then(|id| self.groups.get(&id))
            .map(GroupRef::from);
        Ok(PostWithRelations {
            post: post.clone(),
            author: AuthorRef::from(author),
            group,
        })
    }
}

/// Mutex-guarded maps implementing every repository trait.
#[derive(Clone, Default)]
pub struct MemoryRepositories {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: USERNAME_UNIQUE_CONSTRAINT.to_string(),
            });
        }
        let user = UserRecord {
            id: state.allocate_id(),
            username: params.username,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepositories {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.groups.values().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: GROUP_SLUG_UNIQUE_CONSTRAINT.to_string(),
            });
        }
        let group = GroupRecord {
            id: state.allocate_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.values().find(|group| group.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.state.lock().await.groups.get(&id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut groups: Vec<_> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list_posts(
        &self,
        scope: PostListScope,
        page: PageRequest,
    ) -> Result<Vec<PostWithRelations>, RepoError> {
        let state = self.state.lock().await;
        let mut posts: Vec<&PostRecord> = state
            .posts
            .values()
            .filter(|post| state.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        posts
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .map(|post| state.with_relations(post))
            .collect()
    }

    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        let count = state
            .posts
            .values()
            .filter(|post| state.in_scope(post, scope))
            .count();
        Ok(count as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostWithRelations>, RepoError> {
        let state = self.state.lock().await;
        state
            .posts
            .get(&id)
            .map(|post| state.with_relations(post))
            .transpose()
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.require_user(params.author_id)?;
        state.require_group(params.group_id)?;
        let post = PostRecord {
            id: state.allocate_id(),
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.require_group(params.group_id)?;
        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.require_user(params.author_id)?;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("post {} does not exist", params.post_id),
            });
        }
        let comment = CommentRecord {
            id: state.allocate_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let state = self.state.lock().await;
        state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| {
                let author = state.require_user(comment.author_id)?;
                Ok(CommentWithAuthor {
                    comment: comment.clone(),
                    author: AuthorRef::from(author),
                })
            })
            .collect()
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepositories {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.state.lock().await.is_following(user_id, author_id))
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "users cannot follow themselves".to_string(),
            });
        }
        state.require_user(user_id)?;
        state.require_user(author_id)?;
        if state.is_following(user_id, author_id) {
            return Ok(false);
        }
        let edge = FollowRecord {
            id: state.allocate_id(),
            user_id,
            author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.follows.insert(edge.id, edge);
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|_, edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok(state.follows.len() < before)
    }

    async fn count_follows(&self) -> Result<u64, RepoError> {
        Ok(self.state.lock().await.follows.len() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepositories {
    async fn create_session(&self, user_id: i64) -> Result<SessionRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.require_user(user_id)?;
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .get(&id)
            .and_then(|session| state.users.get(&session.user_id))
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.state.lock().await.sessions.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(repos: &MemoryRepositories, username: &str) -> UserRecord {
        UsersRepo::create_user(
            repos,
            CreateUserParams {
                username: username.to_string(),
                password_hash: "hash".to_string(),
            },
        )
        .await
        .expect("create user")
    }

    #[tokio::test]
    async fn duplicate_username_reports_constraint() {
        let repos = MemoryRepositories::new();
        seed_user(&repos, "leo").await;
        let err = UsersRepo::create_user(
            &repos,
            CreateUserParams {
                username: "leo".to_string(),
                password_hash: "other".to_string(),
            },
        )
        .await
        .expect_err("duplicate rejected");
        assert!(err.is_duplicate(USERNAME_UNIQUE_CONSTRAINT));
    }

    #[tokio::test]
    async fn follow_edges_are_unique_and_never_self() {
        let repos = MemoryRepositories::new();
        let leo = seed_user(&repos, "leo").await;
        let anna = seed_user(&repos, "anna").await;

        assert!(repos.create_follow(leo.id, anna.id).await.unwrap());
        assert!(!repos.create_follow(leo.id, anna.id).await.unwrap());
        assert_eq!(repos.count_follows().await.unwrap(), 1);
        assert!(repos.create_follow(leo.id, leo.id).await.is_err());

        assert!(repos.delete_follow(leo.id, anna.id).await.unwrap());
        assert!(!repos.delete_follow(leo.id, anna.id).await.unwrap());
    }

    #[tokio::test]
    async fn posts_list_newest_first_within_scope() {
        let repos = MemoryRepositories::new();
        let leo = seed_user(&repos, "leo").await;
        let group = repos
            .create_group(CreateGroupParams {
                title: "Cats".to_string(),
                slug: "cats".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();

        for (index, group_id) in [None, Some(group.id), None].into_iter().enumerate() {
            repos
                .create_post(CreatePostParams {
                    author_id: leo.id,
                    text: format!("post {index}"),
                    group_id,
                    image: None,
                })
                .await
                .unwrap();
        }

        let all = repos
            .list_posts(PostListScope::All, PageRequest::new(0, 10))
            .await
            .unwrap();
        let texts: Vec<_> = all.iter().map(|p| p.post.text.as_str()).collect();
        assert_eq!(texts, ["post 2", "post 1", "post 0"]);

        let grouped = repos
            .list_posts(PostListScope::Group(group.id), PageRequest::new(0, 10))
            .await
            .unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].group.as_ref().map(|g| g.slug.as_str()), Some("cats"));
    }

    #[tokio::test]
    async fn posts_require_existing_author_and_group() {
        let repos = MemoryRepositories::new();
        let err = repos
            .create_post(CreatePostParams {
                author_id: 42,
                text: "orphan".to_string(),
                group_id: None,
                image: None,
            })
            .await
            .expect_err("missing author");
        assert!(matches!(err, RepoError::InvalidInput { .. }));
    }
}
