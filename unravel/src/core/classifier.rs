//! Classification of raw error text into known symptoms.

use crate::core::registry::Registry;
use crate::core::types::FixableError;
use crate::error::UnravelError;

/// Test `text` against the pattern registered for `symptom`.
///
/// The text is matched as bytes, so arbitrary subprocess output never fails to
/// match because of its encoding.
///
/// - `Ok(Some(_))` when the pattern matches.
/// - `Ok(None)` when it does not.
/// - `Err(UnregisteredError)` when no pattern exists for `symptom`.
pub fn classify(
    registry: &Registry,
    symptom: &str,
    text: &[u8],
) -> Result<Option<FixableError>, UnravelError> {
    let pattern = registry
        .get_pattern(symptom)
        .ok_or_else(|| UnravelError::UnregisteredError {
            symptom: symptom.to_string(),
            text: String::from_utf8_lossy(text).into_owned(),
        })?;
    Ok(pattern
        .captures(text)
        .map(|captures| FixableError::from_captures(symptom, &captures)))
}

/// Try `symptoms` in order; the first match wins and later symptoms are not
/// consulted.
pub fn classify_first<S: AsRef<str>>(
    registry: &Registry,
    symptoms: &[S],
    text: &[u8],
) -> Result<Option<FixableError>, UnravelError> {
    for symptom in symptoms {
        if let Some(found) = classify(registry, symptom.as_ref(), text)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::bytes::Regex;

    fn registry_with(patterns: &[(&str, &str)]) -> Registry {
        let mut registry = Registry::new();
        for (symptom, pattern) in patterns {
            registry.add_pattern(symptom, Regex::new(pattern).expect("regex"));
        }
        registry
    }

    #[test]
    fn classify_unregistered_symptom_fails() {
        let registry = Registry::new();
        let err = classify(&registry, "no_git", b"git: not found").expect_err("unregistered");
        assert!(matches!(err, UnravelError::UnregisteredError { symptom, .. } if symptom == "no_git"));
    }

    #[test]
    fn classify_no_match_is_none() {
        let registry = registry_with(&[("no_git", "git: not found")]);
        let found = classify(&registry, "no_git", b"cc: not found").expect("classify");
        assert!(found.is_none());
    }

    #[test]
    fn classify_matches_invalid_utf8() {
        let registry = registry_with(&[("no_lib", r"missing lib(\w+)")]);
        let text = b"\xff\xfe garbage: missing libssl";
        let found = classify(&registry, "no_lib", text)
            .expect("classify")
            .expect("match");
        assert_eq!(found.groups, vec!["ssl".to_string()]);
    }

    #[test]
    fn classify_first_prefers_declared_order() {
        let registry = registry_with(&[("a", "not found"), ("b", "git")]);
        let found = classify_first(&registry, &["a", "b"], b"git: not found")
            .expect("classify")
            .expect("match");
        assert_eq!(found.symptom, "a");
    }

    #[test]
    fn classify_first_stops_before_unregistered_when_matched() {
        let registry = registry_with(&[("a", "not found")]);
        let found = classify_first(&registry, &["a", "unregistered"], b"git: not found")
            .expect("classify");
        assert_eq!(found.expect("match").symptom, "a");
    }
}
