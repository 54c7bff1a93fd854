use crate::models::Condition;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Canonical form of a free-text product query: trimmed, lower-cased,
/// internal whitespace runs collapsed to single spaces. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable fingerprint of (normalized query, condition). The sole identity
/// for cached signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(normalized_query: &str, condition: Option<Condition>) -> Self {
        let mut hasher = DefaultHasher::new();
        normalized_query.hash(&mut hasher);
        condition_tag(condition).hash(&mut hasher);
        Self(format!("signal:{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn condition_tag(condition: Option<Condition>) -> &'static str {
    match condition {
        Some(Condition::New) => "NEW",
        Some(Condition::Used) => "USED",
        None => "ANY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize("  Nike  Dunk "), "nike dunk");
        assert_eq!(normalize("  Nike  Dunk "), normalize("nike dunk"));
        assert_eq!(normalize("PS5\t Slim\nDigital"), "ps5 slim digital");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["  Nike  Dunk ", "LEGO 75192  ", "", "   ", "a"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn cache_key_is_pure_and_condition_sensitive() {
        let a = CacheKey::derive("nike dunk", None);
        let b = CacheKey::derive("nike dunk", None);
        assert_eq!(a, b);

        let new = CacheKey::derive("nike dunk", Some(Condition::New));
        let used = CacheKey::derive("nike dunk", Some(Condition::Used));
        assert_ne!(a, new);
        assert_ne!(new, used);
    }

    #[test]
    fn cache_key_has_fixed_shape() {
        let key = CacheKey::derive("iphone 13 mini", Some(Condition::Used));
        assert!(key.as_str().starts_with("signal:"));
        assert_eq!(key.as_str().len(), "signal:".len() + 16);
    }
}
