//! Client-side form checks for the auth screens.
//!
//! Everything here runs before any network call; a form that fails
//! validation never reaches the identity provider.

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;

use crate::session::SignUpFields;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("enter a valid email address")]
    InvalidEmail,
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("{0} is required")]
    Required(&'static str),
}

/// Trim and lowercase an email, rejecting anything without a single `@`
/// splitting two non-empty parts and a dotted domain.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized.len() > MAX_EMAIL_LEN || normalized.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    let Some((local, domain)) = normalized.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty() || domain.contains('@') || !is_domain(domain) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(normalized)
}

fn is_domain(domain: &str) -> bool {
    let labels = domain.split('.').collect::<Vec<_>>();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    validate_password(password)?;
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Sign-in only checks presence; length rules apply when a password is chosen.
pub fn validate_sign_in(email: &str, password: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::Required("password"));
    }
    Ok(email)
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_owned())
}

/// Raw sign-up form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

impl SignUpForm {
    /// Validate and convert to provider fields. Invitation data is attached
    /// by the caller.
    pub fn validate(&self) -> Result<SignUpFields, ValidationError> {
        let email = normalize_email(&self.email)?;
        let first_name = required(&self.first_name, "first name")?;
        let last_name = required(&self.last_name, "last name")?;
        validate_new_password(&self.password, &self.confirm_password)?;
        Ok(SignUpFields {
            email,
            password: self.password.clone(),
            first_name,
            last_name,
            ..SignUpFields::default()
        })
    }
}

/// Validated profile edit.
pub fn validate_profile_names(first_name: &str, last_name: &str) -> Result<(String, String), ValidationError> {
    Ok((required(first_name, "first name")?, required(last_name, "last name")?))
}
