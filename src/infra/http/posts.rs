//! Signed-in write paths: post create/edit, comments and follow edges.

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::posts::{CommentOutcome, EditAccess, EditOutcome, PostError},
    domain::entities::UserRecord,
    presentation::views::{
        FormErrors, LayoutContext, PostFormTemplate, PostFormView, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{
    HttpState, follow_error_response,
    forms::{CommentForm, PostSubmission},
    parse_id, post_error_response,
    session::RequireUser,
};

/// Everything needed to draw the post form again.
struct FormState<'a> {
    action: String,
    is_edit: bool,
    text: String,
    group: Option<String>,
    current_image: Option<&'a str>,
    errors: FormErrors,
    status: StatusCode,
}

async fn render_post_form(
    state: &HttpState,
    user: &UserRecord,
    form: FormState<'_>,
    source: &'static str,
) -> Response {
    let chrome = state.chrome(Some(user), &form.action);
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return post_error_response(source, err, chrome),
    };
    let selected = form
        .group
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());
    let title = if form.is_edit { "Edit post" } else { "New post" };

    let content = PostFormView::new(
        form.action,
        form.is_edit,
        form.text,
        selected,
        &groups,
        form.current_image,
        form.errors,
    );
    let view = LayoutContext::new(chrome.with_title(title), content);
    render_template_response(PostFormTemplate { view }, form.status)
}

pub(super) async fn post_create_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    let form = FormState {
        action: "/create/".to_string(),
        is_edit: false,
        text: String::new(),
        group: None,
        current_image: None,
        errors: FormErrors::default(),
        status: StatusCode::OK,
    };
    render_post_form(&state, &user, form, "infra::http::posts::post_create_form").await
}

pub(super) async fn post_create(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    PostSubmission(draft): PostSubmission,
) -> Response {
    const SOURCE: &str = "infra::http::posts::post_create";
    let text = draft.text.clone();
    let group = draft.group.clone();

    match state.posts.create(&user, draft).await {
        Ok(_) => Redirect::to(&profile_href(&user.username)).into_response(),
        Err(PostError::Invalid(errors)) => {
            let form = FormState {
                action: "/create/".to_string(),
                is_edit: false,
                text,
                group,
                current_image: None,
                errors: FormErrors::from(errors.as_slice()),
                status: StatusCode::BAD_REQUEST,
            };
            render_post_form(&state, &user, form, SOURCE).await
        }
        Err(err) => post_error_response(SOURCE, err, state.chrome(Some(&user), "/create/")),
    }
}

pub(super) async fn post_edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::post_edit_form";
    let action = format!("/posts/{raw_id}/edit/");
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(state.chrome(Some(&user), &action));
    };

    match state.posts.load_for_edit(&user, id).await {
        Ok(EditAccess::Allowed(post)) => {
            let form = FormState {
                action,
                is_edit: true,
                text: post.post.text.clone(),
                group: post.post.group_id.map(|id| id.to_string()),
                current_image: post.post.image.as_deref(),
                errors: FormErrors::default(),
                status: StatusCode::OK,
            };
            render_post_form(&state, &user, form, SOURCE).await
        }
        Ok(EditAccess::NotAuthor) => Redirect::to(&post_href(id)).into_response(),
        Err(err) => post_error_response(SOURCE, err, state.chrome(Some(&user), &action)),
    }
}

pub(super) async fn post_edit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    PostSubmission(draft): PostSubmission,
) -> Response {
    const SOURCE: &str = "infra::http::posts::post_edit";
    let action = format!("/posts/{raw_id}/edit/");
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(state.chrome(Some(&user), &action));
    };
    let text = draft.text.clone();
    let group = draft.group.clone();

    match state.posts.edit(&user, id, draft).await {
        Ok(EditOutcome::Updated(_) | EditOutcome::NotAuthor) => {
            Redirect::to(&post_href(id)).into_response()
        }
        Err(PostError::Invalid(errors)) => {
            let existing = match state.posts.load_for_edit(&user, id).await {
                Ok(EditAccess::Allowed(post)) => post.post.image,
                _ => None,
            };
            let form = FormState {
                action,
                is_edit: true,
                text,
                group,
                current_image: existing.as_deref(),
                errors: FormErrors::from(errors.as_slice()),
                status: StatusCode::BAD_REQUEST,
            };
            render_post_form(&state, &user, form, SOURCE).await
        }
        Err(err) => post_error_response(SOURCE, err, state.chrome(Some(&user), &action)),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::add_comment";
    let chrome = || state.chrome(Some(&user), &format!("/posts/{raw_id}/"));
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(chrome());
    };

    match state.posts.add_comment(&user, id, &form.text).await {
        Ok(CommentOutcome::Created(_) | CommentOutcome::Rejected(_)) => {
            Redirect::to(&post_href(id)).into_response()
        }
        Err(err) => post_error_response(SOURCE, err, chrome()),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::profile_follow";
    match state.follow.follow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => follow_error_response(
            SOURCE,
            err,
            state.chrome(Some(&user), &profile_href(&username)),
        ),
    }
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::profile_unfollow";
    match state.follow.unfollow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => follow_error_response(
            SOURCE,
            err,
            state.chrome(Some(&user), &profile_href(&username)),
        ),
    }
}
