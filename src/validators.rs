/// Input validators for registration, login and password changes
/// Features:
/// 1. DoS Protection: Input length limits
/// 2. Email format validation and normalization
/// 3. Name sanity checks (control characters, symbol floods)
/// 4. Password length policy

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::Role;
use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 255;
const MIN_NAME_LENGTH: usize = 3;
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt ignores everything past 72 bytes; the cap mainly bounds work
pub const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();
}

/// Validates an email address and returns it trimmed and lowercased
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a display name and returns it trimmed
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("name".to_string()));
    }

    let length = trimmed.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort("name".to_string(), MIN_NAME_LENGTH));
    }

    if length > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH));
    }

    if has_suspicious_name_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("name".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates a new password against the length policy
pub fn is_valid_password(field: &str, password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(field.to_string(), MIN_PASSWORD_LENGTH));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_PASSWORD_LENGTH));
    }

    Ok(())
}

/// Parses an optional role, defaulting to `student`
pub fn parse_role(role: Option<&str>) -> Result<Role, ValidationError> {
    match role.map(str::trim) {
        None | Some("") => Ok(Role::default()),
        Some(value) => value.parse::<Role>().map_err(|_| {
            ValidationError::InvalidValue(
                "role".to_string(),
                "must be one of administrator, instructor, student, registrar".to_string(),
            )
        }),
    }
}

/// Detects suspicious patterns in email addresses
fn has_suspicious_email_patterns(email: &str) -> bool {
    // Over-long local part (before @)
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}

/// Detects suspicious patterns in names
fn has_suspicious_name_patterns(name: &str) -> bool {
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    let special_char_count = name
        .chars()
        .filter(|c| {
            !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '-' | '.' | '_' | '\'')
        })
        .count();

    special_char_count > 5
}
