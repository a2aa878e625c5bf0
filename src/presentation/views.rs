use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::{Page, PageWindow};
use crate::domain::entities::{CommentWithAuthor, GroupRecord, PostWithRelations, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{excerpt, format_human_date, format_iso_date};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

/// Links either side of the current page in the paginator.
const PAGINATION_RADIUS: u64 = 2;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title("Page not found"), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub profile_href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

/// Everything the base layout needs, independent of the page body.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<ViewerView>,
}

impl LayoutChrome {
    /// Chrome for `path` as seen by `viewer`; anonymous and signed-in visitors get different menus.
    pub fn new(site_title: &str, viewer: Option<&UserRecord>, path: &str) -> Self {
        let links: &[(&str, &str)] = match viewer {
            Some(_) => &[
                ("/about/author/", "About the author"),
                ("/about/tech/", "Technologies"),
                ("/follow/", "Following"),
                ("/create/", "New post"),
                ("/auth/password_change/", "Change password"),
                ("/auth/logout/", "Log out"),
            ],
            None => &[
                ("/about/author/", "About the author"),
                ("/about/tech/", "Technologies"),
                ("/auth/login/", "Log in"),
                ("/auth/signup/", "Sign up"),
            ],
        };

        let entries = links
            .iter()
            .map(|(href, label)| NavigationLinkView {
                label: (*label).to_string(),
                href: (*href).to_string(),
                is_active: *href == path,
            })
            .collect();

        let year = time::OffsetDateTime::now_utc().year();

        Self {
            brand: BrandView {
                title: site_title.to_string(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            footer: FooterView {
                copy: format!("© {year} {site_title}"),
            },
            meta: PageMetaView {
                title: site_title.to_string(),
                description: format!("{site_title}: posts, groups and authors worth following."),
            },
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                profile_href: profile_href(&user.username),
            }),
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            meta: PageMetaView {
                title: title.into(),
                ..self.meta
            },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            viewer: chrome.viewer,
            content,
        }
    }
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn media_href(path: &str) -> String {
    format!("/media/{path}")
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub author_href: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub published: String,
    pub published_iso: String,
    pub detail_href: String,
}

impl From<&PostWithRelations> for PostCard {
    fn from(entry: &PostWithRelations) -> Self {
        Self {
            id: entry.post.id,
            text: entry.post.text.clone(),
            author_username: entry.author.username.clone(),
            author_href: profile_href(&entry.author.username),
            group: entry.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: entry.post.image.as_deref().map(media_href),
            published: format_human_date(entry.post.created_at),
            published_iso: format_iso_date(entry.post.created_at),
            detail_href: post_href(entry.post.id),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u64,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub has_other_pages: bool,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginationView {
    pub fn new(window: &PageWindow, base_path: &str) -> Self {
        let href = |number: u64| format!("{base_path}?page={number}");
        let start = window.number.saturating_sub(PAGINATION_RADIUS).max(1);
        let end = (window.number + PAGINATION_RADIUS).min(window.num_pages);

        Self {
            number: window.number,
            num_pages: window.num_pages,
            has_other_pages: window.has_other_pages(),
            first_href: (start > 1).then(|| href(1)),
            previous_href: window.previous_page_number().map(href),
            next_href: window.next_page_number().map(href),
            last_href: (end < window.num_pages).then(|| href(window.num_pages)),
            pages: (start..=end)
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == window.number,
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct TimelineView {
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl TimelineView {
    pub fn new(page: &Page<PostWithRelations>, base_path: &str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            pagination: PaginationView::new(&page.window, base_path),
        }
    }
}

pub struct FeedPageView {
    pub heading: String,
    pub timeline: TimelineView,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedPageView>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedPageView>,
}

pub struct GroupPageView {
    pub title: String,
    pub description: String,
    pub timeline: TimelineView,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfileView {
    pub username: String,
    pub post_count: u64,
    pub following: bool,
    /// Signed-in visitor looking at someone else's profile.
    pub can_follow: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub timeline: TimelineView,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct CommentView {
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentWithAuthor> for CommentView {
    fn from(entry: &CommentWithAuthor) -> Self {
        Self {
            author_username: entry.author.username.clone(),
            author_href: profile_href(&entry.author.username),
            text: entry.comment.text.clone(),
            published: format_human_date(entry.comment.created_at),
        }
    }
}

pub struct PostDetailView {
    pub title: String,
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub edit_href: Option<String>,
    pub comment_action: Option<String>,
}

impl PostDetailView {
    pub fn new(
        post: &PostWithRelations,
        author_post_count: u64,
        comments: &[CommentWithAuthor],
        viewer: Option<&UserRecord>,
    ) -> Self {
        let is_author = viewer.is_some_and(|user| user.id == post.author.id);
        Self {
            title: excerpt(&post.post.text),
            post: PostCard::from(post),
            author_post_count,
            comments: comments.iter().map(CommentView::from).collect(),
            edit_href: is_author.then(|| format!("/posts/{}/edit/", post.post.id)),
            comment_action: viewer.map(|_| format!("/posts/{}/comment/", post.post.id)),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct FieldErrorView {
    pub field: String,
    pub message: String,
}

/// Validation messages keyed by form field.
#[derive(Clone, Default)]
pub struct FormErrors {
    pub entries: Vec<FieldErrorView>,
}

impl FormErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.entries.push(FieldErrorView {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.field == field)
            .map(|entry| entry.message.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&[DomainError]> for FormErrors {
    fn from(errors: &[DomainError]) -> Self {
        let mut form = Self::default();
        for error in errors {
            form.push(error.field(), error.message());
        }
        form
    }
}

pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

impl PostFormView {
    pub fn new(
        action: String,
        is_edit: bool,
        text: String,
        selected_group: Option<i64>,
        groups: &[GroupRecord],
        current_image: Option<&str>,
        errors: FormErrors,
    ) -> Self {
        Self {
            is_edit,
            action,
            text,
            groups: groups
                .iter()
                .map(|group| GroupOptionView {
                    id: group.id,
                    title: group.title.clone(),
                    selected: Some(group.id) == selected_group,
                })
                .collect(),
            current_image: current_image.map(media_href),
            errors,
        }
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct SignupView {
    pub username: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

pub struct LoginView {
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

pub struct PasswordChangeView {
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub view: LayoutContext<PasswordChangeView>,
}

/// Short confirmation pages: logged out, password changed.
pub struct NoticeView {
    pub heading: String,
    pub message: String,
    pub action: ErrorAction,
}

#[derive(Template)]
#[template(path = "users/notice.html")]
pub struct NoticeTemplate {
    pub view: LayoutContext<NoticeView>,
}

pub struct AboutView {
    pub heading: String,
    pub paragraphs: Vec<String>,
}

#[derive(Template)]
#[template(path = "about/about.html")]
pub struct AboutTemplate {
    pub view: LayoutContext<AboutView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. Try returning to the homepage."
                .to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }

    pub fn new(href: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            label: label.into(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::{PAGE_SIZE, Paginator};

    #[test]
    fn pagination_links_keep_a_window_around_current_page() {
        let window = Paginator::new(95, PAGE_SIZE).page(Some("5"));
        let view = PaginationView::new(&window, "/");
        let numbers: Vec<_> = view.pages.iter().map(|link| link.number).collect();
        assert_eq!(numbers, [3, 4, 5, 6, 7]);
        assert_eq!(view.first_href.as_deref(), Some("/?page=1"));
        assert_eq!(view.last_href.as_deref(), Some("/?page=10"));
        assert_eq!(view.previous_href.as_deref(), Some("/?page=4"));
        assert!(view.pages.iter().any(|link| link.is_current && link.number == 5));
    }

    #[test]
    fn single_page_has_no_other_links() {
        let window = Paginator::new(3, PAGE_SIZE).page(None);
        let view = PaginationView::new(&window, "/group/cats/");
        assert!(!view.has_other_pages);
        assert!(view.next_href.is_none());
        assert!(view.first_href.is_none());
    }

    #[test]
    fn form_errors_group_messages_by_field() {
        let errors = [
            DomainError::validation("text", "This field is required."),
            DomainError::validation("group", "Select a valid choice."),
        ];
        let form = FormErrors::from(&errors[..]);
        assert_eq!(form.for_field("text"), ["This field is required."]);
        assert!(form.for_field("image").is_empty());
    }

    #[test]
    fn navigation_marks_current_path() {
        let chrome = LayoutChrome::new("Blogroll", None, "/auth/login/");
        let active: Vec<_> = chrome
            .navigation
            .entries
            .iter()
            .filter(|entry| entry.is_active)
            .map(|entry| entry.href.as_str())
            .collect();
        assert_eq!(active, ["/auth/login/"]);
        assert!(chrome.viewer.is_none());
    }
}
