//! End-to-end request flows against the in-memory backend.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use blogroll::application::repos::{
    CreateGroupParams, CreatePostParams, CreateUserParams, FollowsRepo, GroupsRepo, PostsRepo,
    SessionsRepo, UsersRepo,
};
use blogroll::cache::{PageCacheConfig, PageCacheState};
use blogroll::domain::entities::{GroupRecord, UserRecord};
use blogroll::infra::http::{HttpOptions, HttpState, build_router, session::SESSION_COOKIE};
use blogroll::infra::memory::MemoryRepositories;
use blogroll::infra::uploads::UploadStorage;

struct TestSite {
    repos: Arc<MemoryRepositories>,
    router: Router,
    cache: Option<PageCacheState>,
    _media: TempDir,
}

impl TestSite {
    fn new(with_cache: bool) -> Self {
        let media = tempfile::tempdir().expect("create media dir");
        let storage =
            Arc::new(UploadStorage::new(media.path().to_path_buf()).expect("upload storage"));
        let repos = Arc::new(MemoryRepositories::new());
        let cache = with_cache
            .then(|| PageCacheState::new(PageCacheConfig::default(), SESSION_COOKIE));
        let options = HttpOptions {
            site_title: "Blogroll".to_string(),
            cache: cache.clone(),
            cookie_secure: false,
            upload_limit_bytes: 1024 * 1024,
        };
        let state = HttpState::new(repos.clone(), storage, options);

        Self {
            repos,
            router: build_router(state),
            cache,
            _media: media,
        }
    }

    /// A user with a live session; returns the `Cookie` header value.
    async fn user(&self, username: &str) -> (UserRecord, String) {
        let user = self
            .repos
            .create_user(CreateUserParams {
                username: username.to_string(),
                password_hash: "not-a-real-hash".to_string(),
            })
            .await
            .expect("create user");
        let session = self
            .repos
            .create_session(user.id)
            .await
            .expect("create session");
        (user, format!("{SESSION_COOKIE}={}", session.id))
    }

    async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.repos
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: String::new(),
            })
            .await
            .expect("create group")
    }

    async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> i64 {
        self.repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|group| group.id),
                image: None,
            })
            .await
            .expect("create post")
            .id
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    // Older askama releases entity-encode `/` inside attributes.
    String::from_utf8(bytes.to_vec())
        .expect("utf-8 body")
        .replace("&#x2f;", "/")
        .replace("&#47;", "/")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

fn post_cards(html: &str) -> usize {
    html.matches("<article class=\"post\">").count()
}

#[tokio::test]
async fn index_pages_hold_ten_posts() {
    let site = TestSite::new(false);
    let (author, _) = site.user("leo").await;
    for n in 0..13 {
        site.post(&author, &format!("post number {n}"), None).await;
    }

    let first = site.get("/", None).await;
    assert_eq!(first.status(), StatusCode::OK);
    let html = body_text(first).await;
    assert_eq!(post_cards(&html), 10);
    assert!(html.contains("post number 12"), "newest post comes first");
    assert!(!html.contains("post number 2<"));

    let second = body_text(site.get("/?page=2", None).await).await;
    assert_eq!(post_cards(&second), 3);
    assert!(second.contains("post number 0"));

    // Out-of-range pages land on the last page, garbage lands on the first.
    let beyond = body_text(site.get("/?page=99", None).await).await;
    assert_eq!(post_cards(&beyond), 3);
    let garbage = body_text(site.get("/?page=abc", None).await).await;
    assert_eq!(post_cards(&garbage), 10);
}

#[tokio::test]
async fn group_page_lists_only_its_posts() {
    let site = TestSite::new(false);
    let (author, _) = site.user("leo").await;
    let cats = site.group("Cats", "cats").await;
    let dogs = site.group("Dogs", "dogs").await;
    site.post(&author, "a cat post", Some(&cats)).await;
    site.post(&author, "a dog post", Some(&dogs)).await;
    site.post(&author, "an ungrouped post", None).await;

    let response = site.get("/group/cats/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("a cat post"));
    assert!(!html.contains("a dog post"));
    assert!(!html.contains("an ungrouped post"));

    let index = body_text(site.get("/", None).await).await;
    assert!(index.contains("All posts in Cats"));

    let missing = site.get("/group/birds/", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_shows_post_count_and_follow_control() {
    let site = TestSite::new(false);
    let (author, _) = site.user("leo").await;
    let (_, reader) = site.user("reader").await;
    site.post(&author, "first", None).await;
    site.post(&author, "second", None).await;

    let html = body_text(site.get("/profile/leo/", Some(&reader)).await).await;
    assert!(html.contains("Total posts: 2"));
    assert!(html.contains("/profile/leo/follow/"));

    let own = body_text(site.get("/profile/reader/", Some(&reader)).await).await;
    assert!(!own.contains("/profile/reader/follow/"));

    let missing = site.get("/profile/nobody/", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn following_twice_creates_one_edge() {
    let site = TestSite::new(false);
    let (_, _) = site.user("leo").await;
    let (_, reader) = site.user("reader").await;

    for _ in 0..2 {
        let response = site.get("/profile/leo/follow/", Some(&reader)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");
    }
    assert_eq!(site.repos.count_follows().await.expect("count"), 1);

    let html = body_text(site.get("/profile/leo/", Some(&reader)).await).await;
    assert!(html.contains("/profile/leo/unfollow/"));

    let response = site.get("/profile/leo/unfollow/", Some(&reader)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let response = site.get("/profile/leo/unfollow/", Some(&reader)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(site.repos.count_follows().await.expect("count"), 0);
}

#[tokio::test]
async fn following_yourself_is_ignored() {
    let site = TestSite::new(false);
    let (_, leo) = site.user("leo").await;

    let response = site.get("/profile/leo/follow/", Some(&leo)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");
    assert_eq!(site.repos.count_follows().await.expect("count"), 0);
}

#[tokio::test]
async fn following_unknown_author_is_not_found() {
    let site = TestSite::new(false);
    let (_, reader) = site.user("reader").await;

    let response = site.get("/profile/ghost/follow/", Some(&reader)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_feed_shows_followed_authors_only() {
    let site = TestSite::new(false);
    let (leo, _) = site.user("leo").await;
    let (mia, _) = site.user("mia").await;
    let (_, reader) = site.user("reader").await;
    let (_, loner) = site.user("loner").await;
    site.post(&leo, "before follow", None).await;
    site.post(&mia, "from mia", None).await;

    let empty = body_text(site.get("/follow/", Some(&reader)).await).await;
    assert_eq!(post_cards(&empty), 0);

    let response = site.get("/profile/leo/follow/", Some(&reader)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    site.post(&leo, "after follow", None).await;

    let html = body_text(site.get("/follow/", Some(&reader)).await).await;
    assert_eq!(post_cards(&html), 2);
    assert!(html.contains("before follow"));
    assert!(html.contains("after follow"));
    assert!(!html.contains("from mia"));

    let unfollowed = body_text(site.get("/follow/", Some(&loner)).await).await;
    assert_eq!(post_cards(&unfollowed), 0);
    assert!(!unfollowed.contains("before follow"));
    assert!(!unfollowed.contains("after follow"));
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let site = TestSite::new(false);

    for path in ["/create/", "/follow/", "/auth/password_change/"] {
        let response = site.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        let expected = format!("/auth/login/?next={}", path.replace('/', "%2F"));
        assert_eq!(location(&response), expected);
    }
}

#[tokio::test]
async fn creating_a_post_redirects_to_profile() {
    let site = TestSite::new(false);
    let (author, cookie) = site.user("leo").await;
    let group = site.group("Cats", "cats").await;

    let body = format!("text=hello+world&group={}", group.id);
    let response = site.post_form("/create/", Some(&cookie), &body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");

    let posts = site
        .repos
        .count_posts(blogroll::application::repos::PostListScope::Author(author.id))
        .await
        .expect("count");
    assert_eq!(posts, 1);
    let html = body_text(site.get("/group/cats/", None).await).await;
    assert!(html.contains("hello world"));
}

#[tokio::test]
async fn blank_post_text_is_rejected() {
    let site = TestSite::new(false);
    let (_, cookie) = site.user("leo").await;

    let response = site.post_form("/create/", Some(&cookie), "text=++&group=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("This field is required."));
}

#[tokio::test]
async fn only_the_author_may_edit() {
    let site = TestSite::new(false);
    let (author, author_cookie) = site.user("leo").await;
    let (_, other_cookie) = site.user("mia").await;
    let id = site.post(&author, "original", None).await;
    let edit = format!("/posts/{id}/edit/");

    let form = site.get(&edit, Some(&author_cookie)).await;
    assert_eq!(form.status(), StatusCode::OK);

    let denied = site.get(&edit, Some(&other_cookie)).await;
    assert_eq!(denied.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&denied), format!("/posts/{id}/"));

    let denied = site
        .post_form(&edit, Some(&other_cookie), "text=hijacked&group=")
        .await;
    assert_eq!(denied.status(), StatusCode::SEE_OTHER);

    let updated = site
        .post_form(&edit, Some(&author_cookie), "text=revised&group=")
        .await;
    assert_eq!(updated.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&updated), format!("/posts/{id}/"));

    let html = body_text(site.get(&format!("/posts/{id}/"), None).await).await;
    assert!(html.contains("revised"));
    assert!(!html.contains("hijacked"));
}

#[tokio::test]
async fn comments_appear_on_the_post() {
    let site = TestSite::new(false);
    let (author, _) = site.user("leo").await;
    let (_, reader) = site.user("reader").await;
    let id = site.post(&author, "discuss", None).await;
    let comment = format!("/posts/{id}/comment/");

    let anonymous = site.post_form(&comment, None, "text=hi").await;
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert!(location(&anonymous).starts_with("/auth/login/?next="));

    let blank = site.post_form(&comment, Some(&reader), "text=+").await;
    assert_eq!(blank.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&blank), format!("/posts/{id}/"));

    let created = site
        .post_form(&comment, Some(&reader), "text=nice+post")
        .await;
    assert_eq!(created.status(), StatusCode::SEE_OTHER);

    let html = body_text(site.get(&format!("/posts/{id}/"), None).await).await;
    assert!(html.contains("nice post"));
    assert_eq!(html.matches("class=\"comment\"").count(), 1);
}

#[tokio::test]
async fn unknown_or_malformed_post_ids_are_not_found() {
    let site = TestSite::new(false);

    for path in ["/posts/999/", "/posts/abc/", "/posts/-3/", "/no/such/page/"] {
        let response = site.get(path, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        let html = body_text(response).await;
        assert!(html.contains("Page Not Found"));
    }
}

#[tokio::test]
async fn signup_signs_in_and_rejects_duplicates() {
    let site = TestSite::new(false);

    let response = site
        .post_form(
            "/auth/signup/",
            None,
            "username=newbie&password1=correct-horse-9&password2=correct-horse-9",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie");
    assert!(cookie.starts_with("sessionid="));
    assert!(cookie.contains("HttpOnly"));

    let duplicate = site
        .post_form(
            "/auth/signup/",
            None,
            "username=newbie&password1=another-pass-7&password2=another-pass-7",
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert!(duplicate.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn bad_credentials_keep_the_login_form() {
    let site = TestSite::new(false);
    site.user("leo").await;

    let response = site
        .post_form("/auth/login/", None, "username=leo&password=wrong&next=%2Ffollow%2F")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("Please enter a correct username and password."));
    assert!(html.contains("value=\"/follow/\""));
}

#[tokio::test]
async fn logout_clears_the_session() {
    let site = TestSite::new(false);
    let (_, cookie) = site.user("leo").await;

    let response = site.get("/auth/logout/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("removal cookie");
    assert!(cleared.starts_with("sessionid="));

    let after = site.get("/follow/", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn home_page_is_replayed_until_the_cache_is_cleared() {
    let site = TestSite::new(true);
    let (author, _) = site.user("leo").await;
    site.post(&author, "before caching", None).await;

    let first = body_text(site.get("/", None).await).await;
    site.post(&author, "written later", None).await;
    let second = body_text(site.get("/", None).await).await;
    assert_eq!(first, second);
    assert!(!second.contains("written later"));

    // Other timelines are never cached.
    let profile = body_text(site.get("/profile/leo/", None).await).await;
    assert!(profile.contains("written later"));

    // Cookies that cannot name a session get the anonymous rendering.
    let junk = body_text(site.get("/", Some("sessionid=garbage")).await).await;
    assert_eq!(first, junk);
    assert_eq!(site.cache.as_ref().expect("cache enabled").store.len(), 1);

    site.cache.as_ref().expect("cache enabled").store.clear();
    let third = body_text(site.get("/", None).await).await;
    assert_ne!(first, third);
    assert!(third.contains("written later"));
}

#[tokio::test]
async fn health_check_reports_no_content() {
    let site = TestSite::new(false);
    let response = site.get("/_health/db", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn about_pages_render() {
    let site = TestSite::new(false);
    for path in ["/about/author/", "/about/tech/"] {
        let response = site.get(path, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}
