use std::sync::Arc;

use slug::slugify;
use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CreateGroupParams, GROUP_SLUG_UNIQUE_CONSTRAINT, GroupsRepo, RepoError,
};
use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;

const GROUP_TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Group administration, driven from the command line.
#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    /// Create a group. A missing slug is derived from the title.
    pub async fn create(
        &self,
        title: &str,
        slug: Option<&str>,
        description: &str,
    ) -> Result<GroupRecord, GroupError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title", "This field is required.").into());
        }
        if title.chars().count() > GROUP_TITLE_MAX_CHARS {
            return Err(DomainError::validation(
                "title",
                format!("Ensure this value has at most {GROUP_TITLE_MAX_CHARS} characters."),
            )
            .into());
        }

        let slug = match slug.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) if slugify(raw) == raw => raw.to_string(),
            Some(_) => {
                return Err(DomainError::validation(
                    "slug",
                    "Enter a valid slug consisting of lowercase letters, numbers or hyphens.",
                )
                .into());
            }
            None => slugify(title),
        };
        if slug.is_empty() {
            return Err(DomainError::validation("slug", "This field is required.").into());
        }

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug,
                description: description.trim().to_string(),
            })
            .await
            .map_err(|err| {
                if err.is_duplicate(GROUP_SLUG_UNIQUE_CONSTRAINT) {
                    GroupError::Invalid(DomainError::validation(
                        "slug",
                        "Group with this slug already exists.",
                    ))
                } else {
                    GroupError::Repo(err)
                }
            })?;

        info!(target = "blogroll::groups", slug = %group.slug, "group created");
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }
}
