//! Current user identity.
//!
//! Resolution order:
//! 1) CLI --user (explicit)
//! 2) GI_USER environment variable
//! 3) git `user.name` / `user.email` as `"Name <email>"`
//! 4) Config default (user.default)

use git2::Repository;

use crate::config::Config;
use crate::git;

/// Environment variable overriding the current user.
pub const USER_ENV: &str = "GI_USER";

/// Resolve the current user from CLI, environment, git config and config.
pub fn resolve_user(cli_user: Option<&str>, repo: Option<&Repository>, config: &Config) -> String {
    if let Some(user) = non_empty(cli_user) {
        return user.to_string();
    }

    if let Ok(env_user) = std::env::var(USER_ENV) {
        if let Some(user) = non_empty(Some(env_user.as_str())) {
            return user.to_string();
        }
    }

    if let Some(user) = repo.and_then(git::configured_user) {
        if let Some(user) = non_empty(Some(user.as_str())) {
            return user.to_string();
        }
    }

    config.user.default.clone()
}

/// Email part of `"Name <email>"`, if present.
pub fn email_of(user: &str) -> Option<&str> {
    let start = user.find('<')?;
    let end = user[start..].find('>')? + start;
    non_empty(Some(&user[start + 1..end]))
}

/// Text matched against `assigned_to` when listing a user's issues.
///
/// The email when there is one, the whole identity otherwise.
pub fn assignee_needle(user: &str) -> &str {
    email_of(user).unwrap_or_else(|| user.trim())
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_user_wins() {
        let config = Config::default();
        assert_eq!(resolve_user(Some("  Carol <c@x.org> "), None, &config), "Carol <c@x.org>");
    }

    #[test]
    fn blank_cli_user_falls_through_to_default() {
        let mut config = Config::default();
        config.user.default = "nobody".to_string();
        if std::env::var(USER_ENV).is_err() {
            assert_eq!(resolve_user(Some("   "), None, &config), "nobody");
        }
    }

    #[test]
    fn email_extraction() {
        assert_eq!(email_of("Alice <alice@example.com>"), Some("alice@example.com"));
        assert_eq!(email_of("<bob@example.com>"), Some("bob@example.com"));
        assert_eq!(email_of("Alice"), None);
        assert_eq!(email_of("Alice <>"), None);
    }

    #[test]
    fn needle_prefers_email() {
        assert_eq!(assignee_needle("Alice <alice@example.com>"), "alice@example.com");
        assert_eq!(assignee_needle(" alice "), "alice");
    }
}
