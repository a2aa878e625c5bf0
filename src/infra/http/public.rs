//! Read-only pages: timelines, post detail, about pages and media.

use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::error::HttpError,
    infra::uploads::UploadStorageError,
    presentation::views::{
        AboutTemplate, AboutView, FeedPageView, FollowTemplate, GroupPageView, GroupTemplate,
        IndexTemplate, LayoutContext, PostDetailTemplate, PostDetailView, ProfileTemplate,
        ProfileView, TimelineView, group_href, profile_href, render_not_found_response,
        render_template_response,
    },
};

use super::{
    HttpState, db_health_response, feed_error_response,
    forms::PageQuery,
    parse_id,
    session::{CurrentUser, RequireUser},
};

pub(super) async fn index(
    State(state): State<HttpState>,
    current: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::index";
    let chrome = state.chrome(current.user(), "/");

    match state.feed.index(query.page.as_deref()).await {
        Ok(page) => {
            let content = FeedPageView {
                heading: "Latest updates".to_string(),
                timeline: TimelineView::new(&page, "/"),
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(SOURCE, err, chrome),
    }
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::group_posts";
    let base = group_href(&slug);
    let chrome = state.chrome(current.user(), &base);

    match state.feed.group(&slug, query.page.as_deref()).await {
        Ok(timeline) => {
            let content = GroupPageView {
                title: timeline.group.title.clone(),
                description: timeline.group.description.clone(),
                timeline: TimelineView::new(&timeline.page, &base),
            };
            let view = LayoutContext::new(chrome.with_title(timeline.group.title), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(SOURCE, err, chrome),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::profile";
    let base = profile_href(&username);
    let viewer = current.user();
    let chrome = state.chrome(viewer, &base);

    match state
        .feed
        .profile(&username, viewer, query.page.as_deref())
        .await
    {
        Ok(timeline) => {
            let author = &timeline.author;
            let content = ProfileView {
                username: author.username.clone(),
                post_count: timeline.post_count,
                following: timeline.following,
                can_follow: viewer.is_some_and(|viewer| viewer.id != author.id),
                follow_href: format!("{base}follow/"),
                unfollow_href: format!("{base}unfollow/"),
                timeline: TimelineView::new(&timeline.page, &base),
            };
            let title = format!("Profile of {}", author.username);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(SOURCE, err, chrome),
    }
}

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::follow_index";
    let chrome = state.chrome(Some(&user), "/follow/");

    match state.feed.following(&user, query.page.as_deref()).await {
        Ok(page) => {
            let content = FeedPageView {
                heading: "Posts from authors you follow".to_string(),
                timeline: TimelineView::new(&page, "/follow/"),
            };
            let view = LayoutContext::new(chrome.with_title("Following"), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(SOURCE, err, chrome),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::post_detail";
    let viewer = current.user();
    let chrome = state.chrome(viewer, &format!("/posts/{raw_id}/"));

    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(chrome);
    };

    match state.feed.post_detail(id).await {
        Ok(detail) => {
            let content = PostDetailView::new(
                &detail.post,
                detail.author_post_count,
                &detail.comments,
                viewer,
            );
            let view = LayoutContext::new(chrome.with_title(content.title.clone()), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(SOURCE, err, chrome),
    }
}

pub(super) async fn about_author(State(state): State<HttpState>, current: CurrentUser) -> Response {
    let content = AboutView {
        heading: "About the author".to_string(),
        paragraphs: vec![
            "Blogroll is a small community blog: write posts, file them under groups and follow the authors you like.".to_string(),
            "It is maintained by a single author who reads every bug report.".to_string(),
        ],
    };
    let chrome = state.chrome(current.user(), "/about/author/");
    let view = LayoutContext::new(chrome.with_title("About the author"), content);
    render_template_response(AboutTemplate { view }, StatusCode::OK)
}

pub(super) async fn about_tech(State(state): State<HttpState>, current: CurrentUser) -> Response {
    let content = AboutView {
        heading: "Technologies".to_string(),
        paragraphs: vec![
            "Pages are rendered on the server with askama templates and served by axum on tokio.".to_string(),
            "Data lives in PostgreSQL behind sqlx; passwords are hashed with argon2.".to_string(),
            "The home timeline is cached in memory for a few seconds at a time.".to_string(),
        ],
    };
    let chrome = state.chrome(current.user(), "/about/tech/");
    let view = LayoutContext::new(chrome.with_title("Technologies"), content);
    render_template_response(AboutTemplate { view }, StatusCode::OK)
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => media_not_found(SOURCE),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            media_not_found(SOURCE)
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn media_not_found(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Upload not found",
        "The requested upload is not available",
    )
    .into_response()
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

pub(super) async fn not_found(
    State(state): State<HttpState>,
    current: CurrentUser,
    uri: Uri,
) -> Response {
    render_not_found_response(state.chrome(current.user(), uri.path()))
}
