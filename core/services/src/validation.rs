//! Local input validation run before any identity call.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static PASSWORD_CHARSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{6,}$").expect("valid password regex"));

static DISPLAY_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_]{1,18}[a-zA-Z0-9]$").expect("valid display name regex")
});

/// Check an email address against the standard address grammar.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// At least six ASCII letters or digits, with at least one of each.
pub fn is_valid_password(password: &str) -> bool {
    PASSWORD_CHARSET_REGEX.is_match(password)
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// 3 to 20 letters, digits or underscores; first and last alphanumeric.
pub fn is_valid_display_name(name: &str) -> bool {
    DISPLAY_NAME_REGEX.is_match(name)
}

/// Validate the credentials of an email login or registration.
///
/// `display_name` is only checked when present.
pub fn is_valid_credentials(email: &str, password: &str, display_name: Option<&str>) -> bool {
    is_valid_email(email)
        && is_valid_password(password)
        && display_name.map_or(true, is_valid_display_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("player@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("player@example"));
        assert!(!is_valid_email("player example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("player@example.c"));
    }

    #[test]
    fn test_password() {
        assert!(is_valid_password("abc123"));
        assert!(is_valid_password("A1b2C3d4"));
        assert!(!is_valid_password("ab12"));
        assert!(!is_valid_password("abcdef"));
        assert!(!is_valid_password("123456"));
        assert!(!is_valid_password("abc12!"));
        assert!(!is_valid_password(""));
    }

    #[test]
    fn test_password_rejects_non_ascii_digits() {
        // Arabic-Indic digit three
        assert!(!is_valid_password("abc12\u{663}"));
        assert!(!is_valid_password("abcde\u{663}"));
        assert!(!is_valid_password("abc12\u{e9}"));
    }

    #[test]
    fn test_display_name() {
        assert!(is_valid_display_name("abc"));
        assert!(is_valid_display_name("Player_One"));
        assert!(is_valid_display_name("a_________________z"));
        assert!(!is_valid_display_name("ab"));
        assert!(!is_valid_display_name("_abc"));
        assert!(!is_valid_display_name("abc_"));
        assert!(!is_valid_display_name("has space"));
        assert!(!is_valid_display_name("abcdefghijklmnopqrstu"));
    }

    #[test]
    fn test_credentials_skip_missing_display_name() {
        assert!(is_valid_credentials("player@example.com", "abc123", None));
        assert!(!is_valid_credentials("player@example.com", "abc123", Some("x")));
        assert!(!is_valid_credentials("nope", "abc123", None));
    }

    proptest! {
        #[test]
        fn prop_display_name_length_bounds(name in "[a-z][a-z0-9_]{0,25}[a-z]") {
            let len = name.len();
            prop_assert_eq!(is_valid_display_name(&name), (3..=20).contains(&len));
        }

        #[test]
        fn prop_letters_only_password_rejected(password in "[a-zA-Z]{6,30}") {
            prop_assert!(!is_valid_password(&password));
        }
    }
}
