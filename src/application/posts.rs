//! Write side for posts and comments.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, MediaStore, PostsRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{
    CommentRecord, GroupRecord, PostRecord, PostWithRelations, UserRecord,
};
use crate::domain::error::DomainError;
use crate::domain::{posts, uploads};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post")]
    UnknownPost,
    #[error("post form is invalid")]
    Invalid(Vec<DomainError>),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Image attached to a post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Raw post form input.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    /// Group id as submitted; empty means "no group".
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug)]
pub enum EditAccess {
    Allowed(PostWithRelations),
    NotAuthor,
}

#[derive(Debug)]
pub enum EditOutcome {
    Updated(PostRecord),
    NotAuthor,
}

#[derive(Debug)]
pub enum CommentOutcome {
    Created(CommentRecord),
    /// Blank comments are dropped without an error page.
    Rejected(DomainError),
}

struct ValidDraft {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<dyn MediaStore>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            posts,
            groups,
            comments,
            media,
        }
    }

    /// Groups offered by the post form.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let valid = self.validate(draft).await?;
        let image = self.store_image(valid.image).await?;

        let post = self
            .posts
            .create_post(CreatePostParams {
                author_id: author.id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(
            target = "blogroll::posts",
            post_id = post.id,
            author = %author.username,
            group_id = ?post.group_id,
            "post created"
        );
        Ok(post)
    }

    /// Load a post for its edit form, checking authorship first.
    pub async fn load_for_edit(
        &self,
        actor: &UserRecord,
        post_id: i64,
    ) -> Result<EditAccess, PostError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;
        if post.author.id != actor.id {
            return Ok(EditAccess::NotAuthor);
        }
        Ok(EditAccess::Allowed(post))
    }

    pub async fn edit(
        &self,
        actor: &UserRecord,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<EditOutcome, PostError> {
        let existing = match self.load_for_edit(actor, post_id).await? {
            EditAccess::Allowed(post) => post,
            EditAccess::NotAuthor => return Ok(EditOutcome::NotAuthor),
        };

        let valid = self.validate(draft).await?;
        // Keep the current image unless a new one was uploaded.
        let image = match self.store_image(valid.image).await? {
            Some(path) => Some(path),
            None => existing.post.image.clone(),
        };

        let post = self
            .posts
            .update_post(UpdatePostParams {
                id: existing.post.id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(
            target = "blogroll::posts",
            post_id = post.id,
            author = %actor.username,
            "post updated"
        );
        Ok(EditOutcome::Updated(post))
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<CommentOutcome, PostError> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(PostError::UnknownPost);
        }

        let text = match posts::normalize_text("text", text) {
            Ok(text) => text,
            Err(err) => return Ok(CommentOutcome::Rejected(err)),
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = "blogroll::posts",
            post_id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(CommentOutcome::Created(comment))
    }

    async fn validate(&self, draft: PostDraft) -> Result<ValidDraft, PostError> {
        let mut errors = Vec::new();

        let text = posts::normalize_text("text", &draft.text)
            .map_err(|err| errors.push(err))
            .ok();

        let group_id = match self.resolve_group(draft.group.as_deref()).await {
            Ok(group_id) => group_id,
            Err(PostError::Invalid(mut group_errors)) => {
                errors.append(&mut group_errors);
                None
            }
            Err(other) => return Err(other),
        };

        let image = match draft.image {
            Some(image) if image.bytes.is_empty() => None,
            Some(image) if !uploads::is_supported_image(&image.content_type) => {
                errors.push(DomainError::validation(
                    "image",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                ));
                None
            }
            other => other,
        };

        match text {
            Some(text) if errors.is_empty() => Ok(ValidDraft {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn resolve_group(&self, raw: Option<&str>) -> Result<Option<i64>, PostError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };
        let invalid = || {
            PostError::Invalid(vec![DomainError::validation(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            )])
        };

        let id = raw.parse::<i64>().map_err(|_| invalid())?;
        match self.groups.find_by_id(id).await? {
            Some(group) => Ok(Some(group.id)),
            None => Err(invalid()),
        }
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        match image {
            Some(image) => {
                let path = self
                    .media
                    .store_image(uploads::POST_IMAGE_DIR, &image.file_name, image.bytes)
                    .await?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}
