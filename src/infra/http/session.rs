//! Cookie sessions and the extractors that resolve them into users.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use cookie::{Cookie, SameSite};
use tracing::warn;
use url::form_urlencoded;
use uuid::Uuid;

use crate::domain::entities::UserRecord;

use super::{HttpState, account_error_to_http};

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_PATH: &str = "/auth/login/";

/// Session cookie for a freshly opened session.
pub fn create_cookie(session_id: Uuid, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .build()
}

/// Expired cookie that makes the browser forget the session.
pub fn clear_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

pub fn set_cookie(response: &mut Response, cookie: Cookie<'static>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => warn!(target = "blogroll::http::session", error = %err, "unencodable cookie"),
    }
}

/// Session id carried by the request, if it parses as one.
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// `/auth/login/?next=...` for a request that needs a signed-in user.
pub fn login_redirect_target(next: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
}

/// The visitor, signed in or not.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session: Option<Uuid>,
    pub user: Option<UserRecord>,
}

impl CurrentUser {
    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }
}

impl FromRequestParts<HttpState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let Some(session) = session_id(&parts.headers) else {
            return Ok(Self {
                session: None,
                user: None,
            });
        };

        let user = state
            .accounts
            .authenticate(session)
            .await
            .map_err(|err| account_error_to_http("infra::http::session::current_user", err))
            .map_err(IntoResponse::into_response)?;

        Ok(Self {
            session: Some(session),
            user,
        })
    }
}

/// A signed-in user. Anonymous visitors are redirected to the login form.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserRecord);

impl FromRequestParts<HttpState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        match current.user {
            Some(user) => Ok(Self(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_redirect_target(next)).into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_encodes_next() {
        assert_eq!(
            login_redirect_target("/create/"),
            "/auth/login/?next=%2Fcreate%2F"
        );
        assert_eq!(
            login_redirect_target("/follow/?page=2"),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(safe_next(Some("/follow/")), Some("/follow/"));
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let id = Uuid::new_v4();
        let rendered = create_cookie(id, false).to_string();
        assert!(rendered.starts_with(&format!("sessionid={id}")));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Path=/"));
        assert!(!rendered.contains("Secure"));
        assert!(create_cookie(id, true).to_string().contains("Secure"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let rendered = clear_cookie(false).to_string();
        assert!(rendered.starts_with("sessionid=;"));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn session_id_ignores_malformed_values() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; sessionid={id}")).expect("header"),
        );
        assert_eq!(session_id(&headers), Some(id));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid=nope"));
        assert_eq!(session_id(&headers), None);
    }
}
