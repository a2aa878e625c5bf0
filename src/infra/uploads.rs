//! Filesystem storage for post images, served back under `/media/`.

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{MediaStore, RepoError};

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Filesystem-backed media storage rooted at the configured uploads directory.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream `stream` to `{dir}/{uuid}-{name}.{ext}` and return that relative path.
    ///
    /// A failed or empty stream leaves no file behind.
    pub async fn store_stream<S>(
        &self,
        dir: &str,
        original_name: &str,
        stream: S,
    ) -> Result<String, UploadStorageError>
    where
        S: Stream<Item = Result<Bytes, UploadStorageError>>,
    {
        let stored_path = build_stored_path(dir, original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        let mut saw_payload = false;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    let _ = fs::remove_file(&absolute).await;
                    return Err(err);
                }
            };
            if chunk.is_empty() {
                continue;
            }
            saw_payload = true;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if !saw_payload {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(UploadStorageError::EmptyPayload);
        }

        debug!(target = "blogroll::uploads", path = %stored_path, "stored upload");
        Ok(stored_path)
    }

    /// Read a stored file into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Map a stored path onto the filesystem, rejecting anything that escapes the root.
    pub fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for UploadStorage {
    async fn store_image(
        &self,
        dir: &str,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<String, RepoError> {
        let payload = stream::once(async move { Ok::<_, UploadStorageError>(bytes) });
        self.store_stream(dir, file_name, payload)
            .await
            .map_err(|err| match err {
                UploadStorageError::EmptyPayload | UploadStorageError::InvalidPath => {
                    RepoError::InvalidInput {
                        message: err.to_string(),
                    }
                }
                other => RepoError::from_persistence(other),
            })
    }
}

fn build_stored_path(dir: &str, original_name: &str) -> String {
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name);
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        format!("{identifier}-{filename}")
    } else {
        format!("{dir}/{identifier}-{filename}")
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
