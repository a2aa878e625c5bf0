//! Form payloads accepted by the HTML handlers.

use axum::{
    extract::{Form, FromRequest, Multipart, Request, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;
use validator::{Validate, ValidationErrors};

use crate::application::{
    accounts::{PasswordChangeInput, SignupInput},
    error::HttpError,
    posts::{ImageUpload, PostDraft},
};
use crate::presentation::views::FormErrors;

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignupForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password1: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password2: String,
}

impl From<SignupForm> for SignupInput {
    fn from(form: SignupForm) -> Self {
        Self {
            username: form.username,
            password1: form.password1,
            password2: form.password2,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordChangeForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub old_password: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub new_password1: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub new_password2: String,
}

impl From<PasswordChangeForm> for PasswordChangeInput {
    fn from(form: PasswordChangeForm) -> Self {
        Self {
            old_password: form.old_password,
            new_password1: form.new_password1,
            new_password2: form.new_password2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

/// Flatten `validator` failures into per-field form errors, ordered by field name.
pub fn validation_errors(errors: &ValidationErrors) -> FormErrors {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut form = FormErrors::default();
    for (field, failures) in fields {
        for failure in failures {
            let message = failure
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| REQUIRED.to_string());
            form.push(&field, message);
        }
    }
    form
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlencodedPost {
    text: String,
    group: Option<String>,
}

/// Post form submitted either urlencoded or as `multipart/form-data` with an image.
#[derive(Debug)]
pub struct PostSubmission(pub PostDraft);

impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<UrlencodedPost>::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(PostDraft {
                text: form.text,
                group: form.group,
                image: None,
            }));
        }

        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(IntoResponse::into_response)?;
        read_post_multipart(&mut multipart)
            .await
            .map(Self)
            .map_err(multipart_error_response)
    }
}

async fn read_post_multipart(multipart: &mut Multipart) -> Result<PostDraft, MultipartError> {
    let mut draft = PostDraft::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("text") => draft.text = field.text().await?,
            Some("group") => draft.group = Some(field.text().await?),
            Some("image") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|value| !value.trim().is_empty());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await?;
                // Browsers submit an empty, nameless part when no file is chosen.
                if let Some(file_name) = file_name {
                    draft.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(draft)
}

fn multipart_error_response(err: MultipartError) -> Response {
    let status = err.status();
    warn!(
        target = "blogroll::http::forms",
        status = status.as_u16(),
        error = %err,
        "failed to read multipart payload"
    );
    let public = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Uploaded file is too large"
    } else {
        "Malformed form submission"
    };
    HttpError::new(
        "infra::http::forms::post_submission",
        status,
        public,
        err.body_text(),
    )
    .into_response()
}
