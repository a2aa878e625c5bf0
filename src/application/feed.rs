use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::pagination::{PAGE_SIZE, Page, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentWithAuthor, GroupRecord, PostWithRelations, UserRecord};
use crate::domain::follows;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GroupTimeline {
    pub group: GroupRecord,
    pub page: Page<PostWithRelations>,
}

pub struct ProfileTimeline {
    pub author: UserRecord,
    pub post_count: u64,
    pub following: bool,
    pub page: Page<PostWithRelations>,
}

pub struct PostDetail {
    pub post: PostWithRelations,
    pub author_post_count: u64,
    pub comments: Vec<CommentWithAuthor>,
}

/// Read side of the site: every paginated timeline plus the post detail view.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
        }
    }

    async fn timeline(
        &self,
        scope: PostListScope,
        raw_page: Option<&str>,
    ) -> Result<Page<PostWithRelations>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = Paginator::new(total, PAGE_SIZE).page(raw_page);
        let items = self.posts.list_posts(scope, window.request()).await?;
        debug!(
            target = "blogroll::feed",
            ?scope,
            page = window.number,
            items = items.len(),
            "timeline loaded"
        );
        Ok(Page::new(items, window))
    }

    pub async fn index(&self, raw_page: Option<&str>) -> Result<Page<PostWithRelations>, FeedError> {
        self.timeline(PostListScope::All, raw_page).await
    }

    pub async fn group(
        &self,
        slug: &str,
        raw_page: Option<&str>,
    ) -> Result<GroupTimeline, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;
        let page = self
            .timeline(PostListScope::Group(group.id), raw_page)
            .await?;
        Ok(GroupTimeline { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        raw_page: Option<&str>,
    ) -> Result<ProfileTimeline, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)?;

        let page = self
            .timeline(PostListScope::Author(author.id), raw_page)
            .await?;

        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                let edge = self.follows.is_following(viewer.id, author.id).await?;
                follows::shows_following(Some(viewer.id), author.id, edge)
            }
            _ => false,
        };

        Ok(ProfileTimeline {
            post_count: page.window.total_items,
            author,
            following,
            page,
        })
    }

    /// Posts by every author `viewer` follows.
    pub async fn following(
        &self,
        viewer: &UserRecord,
        raw_page: Option<&str>,
    ) -> Result<Page<PostWithRelations>, FeedError> {
        self.timeline(PostListScope::FollowedBy(viewer.id), raw_page)
            .await
    }

    pub async fn post_detail(&self, id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::UnknownPost)?;
        let author_post_count = self
            .posts
            .count_posts(PostListScope::Author(post.author.id))
            .await?;
        let comments = self.comments.list_for_post(post.post.id).await?;

        Ok(PostDetail {
            post,
            author_post_count,
            comments,
        })
    }
}
