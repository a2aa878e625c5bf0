//! Account invariants shared by signup, login and password change.

use super::error::DomainError;

pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Usernames accept letters, digits and `@.+-_`, up to 150 characters.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "This field is required."));
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_CHARS} characters."),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username.to_string())
}

/// Check a new password pair; `field` names the second input for error placement.
pub fn validate_new_password(
    field: &'static str,
    password: &str,
    confirmation: &str,
) -> Result<(), DomainError> {
    if password != confirmation {
        return Err(DomainError::validation(
            field,
            "The two password fields didn't match.",
        ));
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(DomainError::validation(
            field,
            format!("This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(
            field,
            "This password is entirely numeric.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_charset_is_enforced() {
        assert_eq!(validate_username(" leo.tolstoy+1 ").unwrap(), "leo.tolstoy+1");
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_new_password("password2", "new_password", "new_password").is_ok());
        assert!(validate_new_password("password2", "new_password", "other_password").is_err());
        assert!(validate_new_password("password2", "short", "short").is_err());
        assert!(validate_new_password("password2", "12345678", "12345678").is_err());
    }
}
