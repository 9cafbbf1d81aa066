//! Client-side form validation run before any request is sent.
//!
//! Failures stay local: they are reported per field and never reach the
//! gateway.

#[cfg(test)]
#[path = "validation_test.rs"]
mod validation_test;

use std::fmt;

use crate::net::types::{BoardInput, BoardPatch, LoginRequest, RegisterRequest};

pub const PASSWORD_MIN_CHARS: usize = 6;
pub const NAME_MIN_CHARS: usize = 1;
pub const NAME_MAX_CHARS: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors found in one form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError { field, message: message.into() });
    }

    /// First message reported for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// # Errors
    ///
    /// Returns every failing field when the email is malformed or the password too short.
    pub fn validate(&self) -> Result<LoginRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()?;
        Ok(LoginRequest { email: self.email.trim().to_owned(), password: self.password.clone() })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    /// # Errors
    ///
    /// Returns every failing field among name, email and password.
    pub fn validate(&self) -> Result<RegisterRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = self.name.trim();
        let name_len = name.chars().count();
        if name_len < NAME_MIN_CHARS {
            errors.push("name", "Enter your name");
        } else if name_len > NAME_MAX_CHARS {
            errors.push("name", format!("Maximum {NAME_MAX_CHARS} characters"));
        }
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()?;
        Ok(RegisterRequest {
            email: self.email.trim().to_owned(),
            password: self.password.clone(),
            name: name.to_owned(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardForm {
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

impl BoardForm {
    /// # Errors
    ///
    /// Returns a `name` error when the trimmed name is empty.
    pub fn validate(&self) -> Result<BoardInput, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.name.trim().is_empty() {
            errors.push("name", "Enter a board name");
        }
        errors.into_result()?;
        let description = Some(self.description.trim())
            .filter(|d| !d.is_empty())
            .map(ToOwned::to_owned);
        Ok(BoardInput { name: self.name.trim().to_owned(), description, is_public: self.is_public })
    }
}

/// A rename must still leave the board with a non-blank name.
///
/// # Errors
///
/// Returns a `name` error when `patch.name` is present but blank.
pub fn validate_board_patch(patch: &BoardPatch) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        errors.push("name", "Enter a board name");
    }
    errors.into_result()
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email.trim()) {
        errors.push("email", "Invalid email");
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push("password", format!("Minimum {PASSWORD_MIN_CHARS} characters"));
    }
}

/// `local@domain.tld` with no whitespace and a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty()
        && tld.len() >= 2
        && !domain.starts_with('.')
        && !domain.contains("..")
}
