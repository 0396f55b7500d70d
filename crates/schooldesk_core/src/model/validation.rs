//! Write-path input validation.
//!
//! # Invariants
//! - Validation runs before any storage mutation, in both backends.
//! - Validation never mutates the input.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MIN_PASSWORD_CHARS: usize = 8;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("username pattern is a valid regex")
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

/// Input rejected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    Blank(&'static str),
    /// Username does not match `[A-Za-z0-9_.-]{3,32}`.
    InvalidUsername(String),
    /// Email is not `local@domain.tld` shaped.
    InvalidEmail(String),
    /// Password shorter than [`MIN_PASSWORD_CHARS`].
    PasswordTooShort,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidUsername(value) => write!(f, "invalid username `{value}`"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::PasswordTooShort => write!(
                f,
                "password must contain at least {MIN_PASSWORD_CHARS} characters"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(())
}

pub(crate) fn require_username(value: &str) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(value) {
        return Err(ValidationError::InvalidUsername(value.to_string()));
    }
    Ok(())
}

pub(crate) fn require_email(value: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(value) {
        return Err(ValidationError::InvalidEmail(value.to_string()));
    }
    Ok(())
}

pub(crate) fn require_password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_pattern_rejects_spaces_and_short_names() {
        assert!(require_username("t1x").is_ok());
        assert!(require_username("a b").is_err());
        assert!(require_username("ab").is_err());
    }

    #[test]
    fn email_pattern_requires_domain_with_dot() {
        assert!(require_email("admin@school.com").is_ok());
        assert_eq!(
            require_email("admin@school"),
            Err(ValidationError::InvalidEmail("admin@school".to_string()))
        );
    }

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(require_text("name", "   "), Err(ValidationError::Blank("name")));
    }
}
