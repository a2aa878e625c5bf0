//! Account lifecycle: signup, login sessions and password changes.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateUserParams, RepoError, SessionsRepo, USERNAME_UNIQUE_CONSTRAINT, UsersRepo,
};
use crate::domain::entities::{SessionRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::users;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account form is invalid")]
    Invalid(Vec<DomainError>),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeInput {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

/// A freshly authenticated user and the session that now identifies them.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub user: UserRecord,
    pub session: SessionRecord,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>, sessions: Arc<dyn SessionsRepo>) -> Self {
        Self { users, sessions }
    }

    /// Register a new account and log it in.
    pub async fn signup(&self, input: SignupInput) -> Result<LoginSession, AccountError> {
        let mut errors = Vec::new();
        let username = users::validate_username(&input.username)
            .map_err(|err| errors.push(err))
            .ok();
        if let Err(err) = users::validate_new_password("password2", &input.password1, &input.password2)
        {
            errors.push(err);
        }
        let username = match username {
            Some(username) if errors.is_empty() => username,
            _ => return Err(AccountError::Invalid(errors)),
        };

        let password_hash = hash_password(&input.password1)?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(err) if err.is_duplicate(USERNAME_UNIQUE_CONSTRAINT) => {
                return Err(AccountError::Invalid(vec![DomainError::validation(
                    "username",
                    "A user with that username already exists.",
                )]));
            }
            Err(err) => return Err(err.into()),
        };

        info!(target = "blogroll::accounts", user = %user.username, "account created");
        self.start_session(user).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginSession, AccountError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            warn!(target = "blogroll::accounts", user = %user.username, "login rejected");
            return Err(AccountError::InvalidCredentials);
        }

        self.start_session(user).await
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), AccountError> {
        self.sessions.delete_session(session_id).await?;
        Ok(())
    }

    /// Resolve a session cookie value into its user. Unknown sessions are anonymous.
    pub async fn authenticate(&self, session_id: Uuid) -> Result<Option<UserRecord>, AccountError> {
        Ok(self.sessions.find_session_user(session_id).await?)
    }

    pub async fn change_password(
        &self,
        user: &UserRecord,
        input: PasswordChangeInput,
    ) -> Result<(), AccountError> {
        let mut errors = Vec::new();
        if !verify_password(&input.old_password, &user.password_hash) {
            errors.push(DomainError::validation(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            ));
        }
        if let Err(err) = users::validate_new_password(
            "new_password2",
            &input.new_password1,
            &input.new_password2,
        ) {
            errors.push(err);
        }
        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }

        let password_hash = hash_password(&input.new_password1)?;
        self.users.update_password(user.id, &password_hash).await?;
        info!(target = "blogroll::accounts", user = %user.username, "password changed");
        Ok(())
    }

    async fn start_session(&self, user: UserRecord) -> Result<LoginSession, AccountError> {
        let session = self.sessions.create_session(user.id).await?;
        Ok(LoginSession { user, session })
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|err| AccountError::Hash(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hash(err.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("correct horse").expect("hash");
        let second = hash_password("correct horse").expect("hash");
        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(verify_password("correct horse", &first));
        assert!(!verify_password("wrong horse", &first));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
