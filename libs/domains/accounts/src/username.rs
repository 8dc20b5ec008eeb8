//! Unique username generation.
//!
//! Candidates are transliterated to ASCII, lower-cased and stripped of
//! characters that are not allowed in usernames. The first candidate that
//! survives becomes the base; collisions are resolved with numeric suffixes
//! (`john`, `john2`, `john3`, ...) while keeping the result within the
//! maximum length.

use rand::distr::{Alphanumeric, Distribution};
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::error::{AccountError, AccountResult};

/// Characters outside word characters, whitespace and `@ + . -`.
/// The ASCII separators `\x1c`-`\x1f` count as whitespace.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\x1c-\x1f@+.-]").expect("static regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\x1c-\x1f]+").expect("static regex"));

fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// Normalizes a single candidate, returning `None` when nothing usable is left.
pub fn normalize(text: &str) -> Option<String> {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();
    let cleaned = DISALLOWED.replace_all(&ascii, "").to_lowercase();

    // Only the part before '@' is kept; the address lives in the email field
    let local = cleaned
        .split('@')
        .next()
        .unwrap_or_default()
        .trim_matches(is_separator);
    let username = WHITESPACE_RUN.replace_all(local, "_").into_owned();

    if username.is_empty() {
        None
    } else {
        Some(username)
    }
}

/// First candidate that normalizes to a non-empty value.
pub fn base_from_candidates<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter(|c| !c.as_ref().is_empty())
        .find_map(|c| normalize(c.as_ref()))
}

/// Random lowercase alphanumeric string of `len` characters.
pub fn random_base(len: usize) -> String {
    Alphanumeric
        .sample_iter(rand::rng())
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Candidate for collision round `index`; round 0 has no suffix, round `i`
/// appends `i + 1`. Returns `None` once the suffix alone exceeds `max_length`.
pub fn candidate(base: &str, index: usize, max_length: usize) -> Option<String> {
    let suffix = if index == 0 {
        String::new()
    } else {
        (index + 1).to_string()
    };

    if suffix.len() > max_length {
        return None;
    }

    let keep = max_length - suffix.len();
    let mut username: String = base.chars().take(keep).collect();
    username.push_str(&suffix);
    Some(username)
}

/// Generates a username from `candidates` that `exists` reports as free.
///
/// `exists` must compare case-insensitively. Fails with
/// [`AccountError::UsernameSpaceExhausted`] when every suffix that fits within
/// `max_length` is taken.
pub async fn generate<I, S, F, Fut>(
    candidates: I,
    max_length: usize,
    mut exists: F,
) -> AccountResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = AccountResult<bool>>,
{
    if max_length == 0 {
        return Err(AccountError::UsernameSpaceExhausted { max_length });
    }

    let base = base_from_candidates(candidates).unwrap_or_else(|| random_base(max_length));

    let mut index = 0;
    while let Some(username) = candidate(&base, index, max_length) {
        if !exists(username.clone()).await? {
            return Ok(username);
        }
        index += 1;
    }

    tracing::error!(base = %base, max_length, "Username space exhausted");
    Err(AccountError::UsernameSpaceExhausted { max_length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn generate_with(taken: &[&str], candidates: &[&str], max_length: usize) -> AccountResult<String> {
        let taken: HashSet<String> = taken.iter().map(|s| s.to_lowercase()).collect();
        generate(candidates.iter(), max_length, |name| {
            let hit = taken.contains(&name.to_lowercase());
            async move { Ok(hit) }
        })
        .await
    }

    #[test]
    fn test_normalize_transliterates_and_cleans() {
        assert_eq!(normalize("Jöhn"), Some("john".to_string()));
        assert_eq!(normalize("  Mary   Jane  "), Some("mary_jane".to_string()));
        assert_eq!(normalize("john.doe@example.com"), Some("john.doe".to_string()));
        assert_eq!(normalize("a+b-c!#$"), Some("a+b-c".to_string()));
        assert_eq!(normalize("Ñoño Ærø"), Some("nono_r".to_string()));
    }

    #[test]
    fn test_normalize_empty_results() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("@example.com"), None);
        assert_eq!(normalize("北京"), None);
    }

    #[test]
    fn test_normalize_treats_ascii_separators_as_whitespace() {
        assert_eq!(normalize("a\x1cb"), Some("a_b".to_string()));
        assert_eq!(normalize("Mary\x1f \x1dJane"), Some("mary_jane".to_string()));
        assert_eq!(normalize("\x1e john \x1f"), Some("john".to_string()));
    }

    #[test]
    fn test_random_base_is_lowercase_alphanumeric() {
        let first = random_base(64);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(first, random_base(64));
        assert_eq!(random_base(0), "");
    }

    #[test]
    fn test_base_skips_unusable_candidates() {
        assert_eq!(
            base_from_candidates(["", "!!!", "Doe"]),
            Some("doe".to_string())
        );
        assert_eq!(base_from_candidates(Vec::<String>::new()), None);
    }

    #[test]
    fn test_candidate_truncates_before_suffix() {
        assert_eq!(candidate("john", 0, 150), Some("john".to_string()));
        assert_eq!(candidate("john", 1, 150), Some("john2".to_string()));
        assert_eq!(candidate("abcdef", 1, 5), Some("abcd2".to_string()));
        assert_eq!(candidate("abcdef", 9, 5), Some("abc10".to_string()));
        assert_eq!(candidate("abc", 9, 1), None);
    }

    #[tokio::test]
    async fn test_first_candidate_free() {
        assert_eq!(generate_with(&[], &["John"], 150).await.unwrap(), "john");
    }

    #[tokio::test]
    async fn test_collision_suffixes() {
        assert_eq!(
            generate_with(&["john"], &["John"], 150).await.unwrap(),
            "john2"
        );
        assert_eq!(
            generate_with(&["JOHN", "john2"], &["John"], 150).await.unwrap(),
            "john3"
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_second_candidate() {
        assert_eq!(
            generate_with(&[], &["", "Doe"], 150).await.unwrap(),
            "doe"
        );
    }

    #[tokio::test]
    async fn test_random_fallback() {
        for candidates in [&[""][..], &[][..]] {
            let username = generate_with(&[], candidates, 30).await.unwrap();
            assert_eq!(username.len(), 30);
            assert!(
                username
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
    }

    #[tokio::test]
    async fn test_long_base_truncated_with_suffix() {
        let long = "a".repeat(200);
        let first = generate_with(&[], &[long.as_str()], 150).await.unwrap();
        assert_eq!(first.len(), 150);

        let second = generate_with(&[first.as_str()], &[long.as_str()], 150)
            .await
            .unwrap();
        assert_eq!(second.len(), 150);
        assert!(second.ends_with('2'));
    }

    #[tokio::test]
    async fn test_result_never_exceeds_max_length() {
        for max_length in 1..12 {
            let username = generate_with(&["averylongname"], &["A very long name"], max_length)
                .await
                .unwrap();
            assert!(!username.is_empty());
            assert!(username.len() <= max_length, "{} > {}", username, max_length);
        }
    }

    #[tokio::test]
    async fn test_exhausted_space_fails() {
        let err = generate(["j"], 1, |_| async { Ok(true) }).await.unwrap_err();
        assert!(matches!(
            err,
            AccountError::UsernameSpaceExhausted { max_length: 1 }
        ));
    }

    #[tokio::test]
    async fn test_lookup_errors_propagate() {
        let err = generate(["john"], 150, |_| async {
            Err(AccountError::Internal("db down".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::Internal(_)));
    }
}
