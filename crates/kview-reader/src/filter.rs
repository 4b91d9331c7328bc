//! Key/value record filtering.

use crate::model::{Filter, KeyMode};

/// Whether a decoded record passes the optional filter.
///
/// A key mode decides on the key alone; otherwise a non-empty value term is
/// matched as a substring of the value. Empty terms match everything.
pub fn matches(key: &str, value: &str, filter: Option<&Filter>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    match filter.key_mode {
        KeyMode::Contains => key.contains(filter.key_term.as_str()),
        KeyMode::StartsWith => key.starts_with(filter.key_term.as_str()),
        KeyMode::None if !filter.value_term.is_empty() => value.contains(filter.value_term.as_str()),
        KeyMode::None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter_matches_everything() {
        assert!(matches("", "", None));
        assert!(matches("user-1", "{}", None));
    }

    #[test]
    fn test_key_contains() {
        let filter = Filter::key_contains("42");
        assert!(matches("order-42-a", "x", Some(&filter)));
        assert!(!matches("order-43", "42", Some(&filter)));
    }

    #[test]
    fn test_key_starts_with() {
        let filter = Filter::key_starts_with("user-");
        assert!(matches("user-7", "", Some(&filter)));
        assert!(!matches("admin-user-7", "", Some(&filter)));
    }

    #[test]
    fn test_key_mode_ignores_value_term() {
        let filter = Filter {
            key_mode: KeyMode::Contains,
            key_term: "abc".to_string(),
            value_term: "never-present".to_string(),
        };
        assert!(matches("xabcx", "unrelated", Some(&filter)));
        assert!(!matches("xyz", "never-present", Some(&filter)));
    }

    #[test]
    fn test_value_contains() {
        let filter = Filter::value_contains("\"status\":\"failed\"");
        assert!(matches("k", r#"{"status":"failed"}"#, Some(&filter)));
        assert!(!matches("k", r#"{"status":"ok"}"#, Some(&filter)));
    }

    #[test]
    fn test_empty_terms_match_everything() {
        assert!(matches("anything", "v", Some(&Filter::key_contains(""))));
        assert!(matches("anything", "v", Some(&Filter::key_starts_with(""))));
        assert!(matches("k", "anything", Some(&Filter::value_contains(""))));
        assert!(matches("k", "v", Some(&Filter::default())));
    }
}
