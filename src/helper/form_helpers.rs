//! Field checks shared by every form-accepting operation. Each returns a
//! `CmsError::Validation` naming the offending field.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CmsError, CmsResult};

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("field pattern is valid"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, r"^[A-Za-z0-9_]+$")
}

fn person_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, r"^[\p{L} ]+$")
}

fn hex_color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, r"^#[0-9A-Fa-f]{6}$")
}

/// Character length in `min..=max`, measured after trimming.
pub fn require_length(field: &str, value: &str, min: usize, max: usize) -> CmsResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(CmsError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub fn require_min_length(field: &str, value: &str, min: usize) -> CmsResult<()> {
    if value.trim().chars().count() < min {
        return Err(CmsError::Validation(format!("{} must be at least {} characters", field, min)));
    }
    Ok(())
}

pub fn require_max_length(field: &str, value: &str, max: usize) -> CmsResult<()> {
    if value.chars().count() > max {
        return Err(CmsError::Validation(format!("{} must be at most {} characters", field, max)));
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

pub fn require_email(email: &str) -> CmsResult<()> {
    if !is_valid_email(email) {
        return Err(CmsError::Validation("Please provide a valid email".to_string()));
    }
    Ok(())
}

/// Trims and lower-cases an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Absolute http(s) URL.
pub fn require_url(field: &str, value: &str) -> CmsResult<()> {
    match url::Url::parse(value.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(CmsError::Validation(format!("{} must be a valid URL", field))),
    }
}

/// Blank optional text becomes `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn require_username(username: &str) -> CmsResult<()> {
    require_length("Username", username, 3, 50)?;
    if !username_regex().is_match(username.trim()) {
        return Err(CmsError::Validation(
            "Username can only contain letters, numbers, and underscores".to_string(),
        ));
    }
    Ok(())
}

pub fn require_person_name(field: &str, name: &str) -> CmsResult<()> {
    require_length(field, name, 2, 50)?;
    if !person_name_regex().is_match(name.trim()) {
        return Err(CmsError::Validation(format!("{} can only contain letters and spaces", field)));
    }
    Ok(())
}

pub fn require_hex_color(color: &str) -> CmsResult<()> {
    if !hex_color_regex().is_match(color) {
        return Err(CmsError::Validation("Color must be a valid hex color (#RRGGBB)".to_string()));
    }
    Ok(())
}

/// Policy for admin-created and admin-reset passwords.
pub fn require_basic_password(password: &str) -> CmsResult<()> {
    if password.chars().count() < 6 {
        return Err(CmsError::Validation("Password must be at least 6 characters".to_string()));
    }
    Ok(())
}

/// Policy for self-service passwords: 6+ chars with upper, lower and digit.
pub fn require_strong_password(password: &str) -> CmsResult<()> {
    require_basic_password(password)?;
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(CmsError::Validation(
            "Password must contain at least one lowercase letter, one uppercase letter, and one number"
                .to_string(),
        ));
    }
    Ok(())
}

pub fn require_confirmation(password: &str, confirmation: &str) -> CmsResult<()> {
    if password != confirmation {
        return Err(CmsError::Validation("Password confirmation does not match".to_string()));
    }
    Ok(())
}
