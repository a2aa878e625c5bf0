//! Signup, login, logout and password change pages.

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;
use validator::Validate;

use crate::{
    application::accounts::{AccountError, LoginSession},
    domain::entities::UserRecord,
    presentation::views::{
        ErrorAction, FormErrors, LayoutContext, LoginTemplate, LoginView, NoticeTemplate,
        NoticeView, PasswordChangeTemplate, PasswordChangeView, SignupTemplate, SignupView,
        render_template_response,
    },
};

use super::{
    HttpState, account_error_to_http,
    forms::{LoginForm, NextQuery, PasswordChangeForm, SignupForm, validation_errors},
    session::{CurrentUser, RequireUser, clear_cookie, create_cookie, safe_next, set_cookie},
};

const SIGNUP_PATH: &str = "/auth/signup/";
const LOGIN_PATH: &str = "/auth/login/";
const PASSWORD_CHANGE_PATH: &str = "/auth/password_change/";
const PASSWORD_CHANGE_DONE_PATH: &str = "/auth/password_change/done/";
const BAD_CREDENTIALS: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

fn render_signup(
    state: &HttpState,
    viewer: Option<&UserRecord>,
    username: String,
    errors: FormErrors,
    status: StatusCode,
) -> Response {
    let chrome = state.chrome(viewer, SIGNUP_PATH).with_title("Sign up");
    let view = LayoutContext::new(chrome, SignupView { username, errors });
    render_template_response(SignupTemplate { view }, status)
}

fn render_login(
    state: &HttpState,
    viewer: Option<&UserRecord>,
    content: LoginView,
    status: StatusCode,
) -> Response {
    let chrome = state.chrome(viewer, LOGIN_PATH).with_title("Log in");
    let view = LayoutContext::new(chrome, content);
    render_template_response(LoginTemplate { view }, status)
}

fn render_password_change(state: &HttpState, user: &UserRecord, errors: FormErrors, status: StatusCode) -> Response {
    let chrome = state
        .chrome(Some(user), PASSWORD_CHANGE_PATH)
        .with_title("Change password");
    let view = LayoutContext::new(chrome, PasswordChangeView { errors });
    render_template_response(PasswordChangeTemplate { view }, status)
}

fn render_notice(
    state: &HttpState,
    viewer: Option<&UserRecord>,
    path: &str,
    content: NoticeView,
) -> Response {
    let chrome = state.chrome(viewer, path).with_title(content.heading.clone());
    let view = LayoutContext::new(chrome, content);
    render_template_response(NoticeTemplate { view }, StatusCode::OK)
}

/// Redirect somewhere with the new session attached.
fn start_session(state: &HttpState, login: LoginSession, target: &str) -> Response {
    let mut response = Redirect::to(target).into_response();
    set_cookie(&mut response, create_cookie(login.session.id, state.cookie_secure));
    response
}

pub(super) async fn signup_form(State(state): State<HttpState>, current: CurrentUser) -> Response {
    render_signup(
        &state,
        current.user(),
        String::new(),
        FormErrors::default(),
        StatusCode::OK,
    )
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    current: CurrentUser,
    Form(form): Form<SignupForm>,
) -> Response {
    const SOURCE: &str = "infra::http::accounts::signup";
    if let Err(errors) = form.validate() {
        return render_signup(
            &state,
            current.user(),
            form.username,
            validation_errors(&errors),
            StatusCode::BAD_REQUEST,
        );
    }

    let username = form.username.clone();
    match state.accounts.signup(form.into()).await {
        Ok(login) => start_session(&state, login, "/"),
        Err(AccountError::Invalid(errors)) => render_signup(
            &state,
            current.user(),
            username,
            FormErrors::from(errors.as_slice()),
            StatusCode::BAD_REQUEST,
        ),
        Err(err) => account_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn login_form(
    State(state): State<HttpState>,
    current: CurrentUser,
    Query(query): Query<NextQuery>,
) -> Response {
    let content = LoginView {
        username: String::new(),
        next: safe_next(query.next.as_deref()).unwrap_or_default().to_string(),
        errors: FormErrors::default(),
    };
    render_login(&state, current.user(), content, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    current: CurrentUser,
    Form(form): Form<LoginForm>,
) -> Response {
    const SOURCE: &str = "infra::http::accounts::login";
    let next = safe_next(form.next.as_deref()).unwrap_or_default().to_string();

    let errors = match form.validate() {
        Err(errors) => validation_errors(&errors),
        Ok(()) => match state.accounts.login(&form.username, &form.password).await {
            Ok(login) => {
                let target = if next.is_empty() { "/" } else { next.as_str() };
                return start_session(&state, login, target);
            }
            Err(AccountError::InvalidCredentials) => {
                let mut errors = FormErrors::default();
                errors.push("__all__", BAD_CREDENTIALS);
                errors
            }
            Err(err) => return account_error_to_http(SOURCE, err).into_response(),
        },
    };

    let content = LoginView {
        username: form.username,
        next,
        errors,
    };
    render_login(&state, current.user(), content, StatusCode::BAD_REQUEST)
}

pub(super) async fn logout(State(state): State<HttpState>, current: CurrentUser) -> Response {
    if let Some(session) = current.session {
        if let Err(err) = state.accounts.logout(session).await {
            warn!(
                target = "blogroll::http::accounts",
                error = %err,
                "failed to delete session on logout"
            );
        }
    }

    let content = NoticeView {
        heading: "You have been logged out".to_string(),
        message: "Thanks for spending some quality time with the site today.".to_string(),
        action: ErrorAction::new(LOGIN_PATH, "Log in again"),
    };
    let mut response = render_notice(&state, None, "/auth/logout/", content);
    set_cookie(&mut response, clear_cookie(state.cookie_secure));
    response
}

pub(super) async fn password_change_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    render_password_change(&state, &user, FormErrors::default(), StatusCode::OK)
}

pub(super) async fn password_change(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Form(form): Form<PasswordChangeForm>,
) -> Response {
    const SOURCE: &str = "infra::http::accounts::password_change";
    if let Err(errors) = form.validate() {
        return render_password_change(
            &state,
            &user,
            validation_errors(&errors),
            StatusCode::BAD_REQUEST,
        );
    }

    match state.accounts.change_password(&user, form.into()).await {
        Ok(()) => Redirect::to(PASSWORD_CHANGE_DONE_PATH).into_response(),
        Err(AccountError::Invalid(errors)) => render_password_change(
            &state,
            &user,
            FormErrors::from(errors.as_slice()),
            StatusCode::BAD_REQUEST,
        ),
        Err(err) => account_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn password_change_done(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    let content = NoticeView {
        heading: "Password changed".to_string(),
        message: "Your password was changed.".to_string(),
        action: ErrorAction::home(),
    };
    render_notice(&state, Some(&user), PASSWORD_CHANGE_DONE_PATH, content)
}
