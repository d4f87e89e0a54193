//! Input validation rules shared by the server (authoritative) and the
//! client (fast feedback).
//!
//! Each check returns the first violated rule as a [`CoreError::Validation`]
//! with a message suitable for showing to a user.

use crate::error::{CoreError, CoreResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Codes that can never be claimed.
pub const RESERVED_CODES: &[&str] = &["admin", "api", "auth", "test", "demo"];

/// Minimum session code length.
pub const MIN_CODE_LEN: usize = 4;
/// Maximum session code length.
pub const MAX_CODE_LEN: usize = 20;
/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 12;
/// Maximum password length.
pub const MAX_PASSWORD_LEN: usize = 128;
/// Maximum file name length.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// MIME types accepted besides any `image/*` type.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "application/json",
    "application/zip",
];

static CODE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+$").expect("valid regex"));
static FILE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\-. ]+$").expect("valid regex"));

/// Validates a session code.
pub fn validate_session_code(code: &str) -> CoreResult<()> {
    let len = code.chars().count();
    if len < MIN_CODE_LEN {
        return Err(CoreError::validation(
            "Session code must be at least 4 characters",
        ));
    }
    if len > MAX_CODE_LEN {
        return Err(CoreError::validation(
            "Session code must not exceed 20 characters",
        ));
    }
    if !CODE_CHARS.is_match(code) {
        return Err(CoreError::validation(
            "Session code can only contain lowercase letters and numbers",
        ));
    }
    if RESERVED_CODES.contains(&code) {
        return Err(CoreError::validation("This session code is reserved"));
    }
    Ok(())
}

/// Validates password strength: 12 to 128 characters with at least one
/// uppercase letter, one lowercase letter and one digit.
pub fn validate_password(password: &str) -> CoreResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(CoreError::validation(
            "Password must be at least 12 characters",
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(CoreError::validation(
            "Password must not exceed 128 characters",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(CoreError::validation(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(CoreError::validation(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(CoreError::validation(
            "Password must contain at least one number",
        ));
    }
    Ok(())
}

/// Validates the size of shared text.
pub fn validate_text(content: &str, max_bytes: usize) -> CoreResult<()> {
    if content.len() > max_bytes {
        return Err(CoreError::validation(format!(
            "Text content is too large (max {}KB)",
            max_bytes / 1000
        )));
    }
    Ok(())
}

/// Metadata of a file about to be uploaded.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta<'a> {
    /// Original file name.
    pub name: &'a str,
    /// Size in bytes.
    pub size: u64,
    /// Declared MIME type.
    pub mime_type: &'a str,
}

/// Validates file name, size and MIME type.
pub fn validate_file(meta: &FileMeta<'_>, max_bytes: u64) -> CoreResult<()> {
    if meta.name.chars().count() > MAX_FILE_NAME_LEN {
        return Err(CoreError::validation("Filename is too long"));
    }
    if !FILE_NAME_CHARS.is_match(meta.name) {
        return Err(CoreError::validation(
            "Filename contains invalid characters",
        ));
    }
    if meta.size > max_bytes {
        return Err(CoreError::validation(format!(
            "File size exceeds {}MB limit",
            max_bytes / (1024 * 1024)
        )));
    }
    if !is_allowed_mime_type(meta.mime_type) {
        return Err(CoreError::validation("File type not allowed"));
    }
    Ok(())
}

/// Returns true for allow-listed MIME types and any `image/*` type.
pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type) || mime_type.starts_with("image/")
}

/// Validates a requested duration in minutes against `max_minutes`.
pub fn validate_extension(minutes: i64, max_minutes: i64) -> CoreResult<()> {
    if minutes < 1 {
        return Err(CoreError::validation("Invalid extension duration"));
    }
    if minutes > max_minutes {
        return Err(CoreError::validation(format!(
            "Extension cannot exceed {max_minutes} minutes"
        )));
    }
    Ok(())
}

/// Validates an analytics action name.
pub fn validate_action(action: &str) -> CoreResult<()> {
    if action.is_empty() || action.len() > 64 {
        return Err(CoreError::validation(
            "Action must be between 1-64 characters",
        ));
    }
    if !action
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(CoreError::validation("Action contains invalid characters"));
    }
    Ok(())
}

/// Normalises and validates an email used for access grants.
pub fn normalize_email(email: &str) -> CoreResult<String> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(CoreError::validation("Invalid email address"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn session_codes() {
        assert!(validate_session_code("frdna").is_ok());
        assert!(validate_session_code("abcd").is_ok());
        assert!(validate_session_code("a1b2c3d4e5f6g7h8i9j0").is_ok());
        assert!(validate_session_code("abc").is_err());
        assert!(validate_session_code("a1b2c3d4e5f6g7h8i9j0k").is_err());
        assert!(validate_session_code("Abcd").is_err());
        assert!(validate_session_code("ab-cd").is_err());
        assert!(validate_session_code("ab cd").is_err());
    }

    #[test]
    fn reserved_codes_rejected() {
        for code in RESERVED_CODES {
            assert!(validate_session_code(code).is_err());
        }
        for code in RESERVED_CODES.iter().filter(|code| code.len() >= 4) {
            let err = validate_session_code(code).unwrap_err();
            assert_eq!(err.to_string(), "This session code is reserved");
        }
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("Str0ngPassword").is_ok());
        assert!(validate_password("Sh0rtPass").is_err());
        assert!(validate_password("nouppercase123").is_err());
        assert!(validate_password("NOLOWERCASE123").is_err());
        assert!(validate_password("NoDigitsHereAtAll").is_err());
        let long = format!("Aa1{}", "x".repeat(126));
        assert!(validate_password(&long).is_err());
    }

    #[test]
    fn password_error_messages() {
        let err = validate_password("short").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 12 characters");
        let err = validate_password("alllowercase123").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Password must contain at least one uppercase letter"
        );
    }

    #[test]
    fn text_limit() {
        assert!(validate_text(&"a".repeat(100_000), 100_000).is_ok());
        let err = validate_text(&"a".repeat(100_001), 100_000).unwrap_err();
        assert!(err.to_string().contains("100KB"));
    }

    #[test]
    fn file_rules() {
        let max = 10 * 1024 * 1024;
        let ok = FileMeta {
            name: "report final.pdf",
            size: 1024,
            mime_type: "application/pdf",
        };
        assert!(validate_file(&ok, max).is_ok());

        let bad_name = FileMeta {
            name: "../etc/passwd",
            ..ok
        };
        assert!(validate_file(&bad_name, max).is_err());

        let too_big = FileMeta {
            size: max + 1,
            ..ok
        };
        assert!(validate_file(&too_big, max)
            .unwrap_err()
            .to_string()
            .contains("10MB"));

        let bad_type = FileMeta {
            mime_type: "application/x-msdownload",
            ..ok
        };
        assert!(validate_file(&bad_type, max).is_err());

        let any_image = FileMeta {
            name: "photo.heic",
            mime_type: "image/heic",
            ..ok
        };
        assert!(validate_file(&any_image, max).is_ok());
    }

    #[test]
    fn extension_bounds() {
        assert!(validate_extension(1, 10_080).is_ok());
        assert!(validate_extension(10_080, 10_080).is_ok());
        assert!(validate_extension(10_081, 10_080).is_err());
        assert!(validate_extension(0, 10_080).is_err());
        assert!(validate_extension(-5, 10_080).is_err());
    }

    #[test]
    fn actions_and_emails() {
        assert!(validate_action("session_accessed").is_ok());
        assert!(validate_action("").is_err());
        assert!(validate_action("drop table;").is_err());
        assert_eq!(normalize_email(" Ann@Example.COM ").unwrap(), "ann@example.com");
        assert!(normalize_email("not-an-email").is_err());
    }

    fn reference_code_rule(code: &str) -> bool {
        let len_ok = (4..=20).contains(&code.len());
        let chars_ok = code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        len_ok && chars_ok && !RESERVED_CODES.contains(&code)
    }

    proptest! {
        #[test]
        fn code_validation_matches_rule(code in "[a-zA-Z0-9_ -]{0,24}") {
            prop_assert_eq!(validate_session_code(&code).is_ok(), reference_code_rule(&code));
        }

        #[test]
        fn password_validation_matches_rule(password in "[a-zA-Z0-9!]{0,140}") {
            let expected = (12..=128).contains(&password.len())
                && password.chars().any(|c| c.is_ascii_uppercase())
                && password.chars().any(|c| c.is_ascii_lowercase())
                && password.chars().any(|c| c.is_ascii_digit());
            prop_assert_eq!(validate_password(&password).is_ok(), expected);
        }
    }
}
