mod accounts;
pub mod forms;
mod middleware;
mod posts;
mod public;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        accounts::{AccountError, AccountService},
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follow::{FollowError, FollowService},
        posts::{PostError, PostService},
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, RepoError,
            SessionsRepo, UsersRepo,
        },
    },
    cache::{PageCacheState, page_cache_layer},
    domain::entities::UserRecord,
    infra::uploads::UploadStorage,
    presentation::views::{LayoutChrome, render_not_found_response},
};

use self::middleware::{log_responses, set_request_context};

/// Per-deployment knobs the handlers need besides the services.
#[derive(Clone)]
pub struct HttpOptions {
    pub site_title: String,
    pub cache: Option<PageCacheState>,
    pub cookie_secure: bool,
    pub upload_limit_bytes: usize,
}

#[derive(Clone)]
pub struct HttpState {
    pub site_title: Arc<str>,
    pub feed: Arc<FeedService>,
    pub follow: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub accounts: Arc<AccountService>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: Option<PageCacheState>,
    pub cookie_secure: bool,
    pub upload_limit_bytes: usize,
}

impl HttpState {
    /// Wire every service onto one repository backend.
    pub fn new<R>(repos: Arc<R>, upload_storage: Arc<UploadStorage>, options: HttpOptions) -> Self
    where
        R: UsersRepo
            + GroupsRepo
            + PostsRepo
            + CommentsRepo
            + FollowsRepo
            + SessionsRepo
            + HealthRepo
            + 'static,
    {
        let users: Arc<dyn UsersRepo> = repos.clone();
        let groups: Arc<dyn GroupsRepo> = repos.clone();
        let posts: Arc<dyn PostsRepo> = repos.clone();
        let comments: Arc<dyn CommentsRepo> = repos.clone();
        let follows: Arc<dyn FollowsRepo> = repos.clone();
        let sessions: Arc<dyn SessionsRepo> = repos.clone();
        let health: Arc<dyn HealthRepo> = repos;

        Self {
            site_title: Arc::from(options.site_title),
            feed: Arc::new(FeedService::new(
                posts.clone(),
                groups.clone(),
                users.clone(),
                follows.clone(),
                comments.clone(),
            )),
            follow: Arc::new(FollowService::new(users.clone(), follows)),
            posts: Arc::new(PostService::new(
                posts,
                groups,
                comments,
                upload_storage.clone(),
            )),
            accounts: Arc::new(AccountService::new(users, sessions)),
            health,
            upload_storage,
            cache: options.cache,
            cookie_secure: options.cookie_secure,
            upload_limit_bytes: options.upload_limit_bytes,
        }
    }

    pub(crate) fn chrome(&self, viewer: Option<&UserRecord>, path: &str) -> LayoutChrome {
        LayoutChrome::new(&self.site_title, viewer, path)
    }
}

pub fn build_router(state: HttpState) -> Router {
    // Only the global timeline is cached.
    let index = Router::new().route("/", get(public::index));
    let index = match state.cache.clone() {
        Some(cache) => index.route_layer(axum_middleware::from_fn_with_state(
            cache,
            page_cache_layer,
        )),
        None => index,
    };

    let upload_limit = DefaultBodyLimit::max(state.upload_limit_bytes);

    Router::new()
        .merge(index)
        .route("/group/{slug}/", get(public::group_posts))
        .route("/profile/{username}/", get(public::profile))
        .route(
            "/profile/{username}/follow/",
            get(posts::profile_follow).post(posts::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(posts::profile_unfollow).post(posts::profile_unfollow),
        )
        .route("/follow/", get(public::follow_index))
        .route("/posts/{id}/", get(public::post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::post_edit_form)
                .post(posts::post_edit)
                .layer(upload_limit.clone()),
        )
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route(
            "/create/",
            get(posts::post_create_form)
                .post(posts::post_create)
                .layer(upload_limit),
        )
        .route(
            "/auth/signup/",
            get(accounts::signup_form).post(accounts::signup),
        )
        .route("/auth/login/", get(accounts::login_form).post(accounts::login))
        .route("/auth/logout/", get(accounts::logout).post(accounts::logout))
        .route(
            "/auth/password_change/",
            get(accounts::password_change_form).post(accounts::password_change),
        )
        .route(
            "/auth/password_change/done/",
            get(accounts::password_change_done),
        )
        .route("/about/author/", get(public::about_author))
        .route("/about/tech/", get(public::about_tech))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::db_health))
        .fallback(public::not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Unknown groups, authors and posts render the 404 page; storage failures become 5xx.
fn feed_error_response(source: &'static str, err: FeedError, chrome: LayoutChrome) -> Response {
    let missing = match err {
        FeedError::UnknownGroup => "Unknown group",
        FeedError::UnknownAuthor => "Unknown author",
        FeedError::UnknownPost => "Unknown post",
        FeedError::Repo(err) => return repo_error_to_http(source, err).into_response(),
    };
    let mut response = render_not_found_response(chrome);
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, missing).attach(&mut response);
    response
}

fn follow_error_response(source: &'static str, err: FollowError, chrome: LayoutChrome) -> Response {
    match err {
        FollowError::UnknownAuthor => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Unknown author")
                .attach(&mut response);
            response
        }
        FollowError::Repo(err) => repo_error_to_http(source, err).into_response(),
    }
}

fn post_error_response(source: &'static str, err: PostError, chrome: LayoutChrome) -> Response {
    match err {
        PostError::UnknownPost => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Unknown post")
                .attach(&mut response);
            response
        }
        PostError::Repo(err) => repo_error_to_http(source, err).into_response(),
        err @ PostError::Invalid(_) => {
            HttpError::from_error(source, StatusCode::BAD_REQUEST, "Invalid post", &err)
                .into_response()
        }
    }
}

pub(crate) fn account_error_to_http(source: &'static str, err: AccountError) -> HttpError {
    match err {
        AccountError::Repo(err) => repo_error_to_http(source, err),
        err @ AccountError::Hash(_) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Account service failure",
            &err,
        ),
        err @ (AccountError::Invalid(_) | AccountError::InvalidCredentials) => {
            HttpError::from_error(source, StatusCode::BAD_REQUEST, "Invalid account form", &err)
        }
    }
}

/// Path ids that are not integers behave like unknown ids.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_map_to_statuses() {
        let cases = [
            (RepoError::NotFound, StatusCode::NOT_FOUND),
            (RepoError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                RepoError::Duplicate {
                    constraint: "users_username_key".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                RepoError::Persistence("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(repo_error_to_http("test", err).status(), status);
        }
    }

    #[test]
    fn non_numeric_ids_are_unknown() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id("-1"), None);
    }

    #[test]
    fn health_failure_is_service_unavailable() {
        let response = db_health_response(Err(RepoError::Timeout));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            db_health_response(Ok(())).status(),
            StatusCode::NO_CONTENT
        );
    }
}
