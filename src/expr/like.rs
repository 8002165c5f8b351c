//! LIKE pattern matching.

/// Matches `s` against a LIKE `pattern`, anchored on both ends.
///
/// `%` matches any run of characters (including empty), `_` matches exactly
/// one character. All other characters match literally.
///
/// NOTE: The recursive backtracking implementation has worst-case O(n*m)
/// complexity for patterns with multiple `%` wildcards. Fine at this scale;
/// production systems compile patterns for linear-time matching.
pub fn like_match(s: &str, pattern: &str) -> bool {
    let s_chars: Vec<char> = s.chars().collect();
    let p_chars: Vec<char> = pattern.chars().collect();
    like_match_at(&s_chars, &p_chars)
}

fn like_match_at(s: &[char], p: &[char]) -> bool {
    let Some(&head) = p.first() else {
        return s.is_empty();
    };

    match head {
        '%' => {
            // Try matching the rest of the pattern from each position.
            (0..=s.len()).any(|i| like_match_at(&s[i..], &p[1..]))
        }
        '_' => !s.is_empty() && like_match_at(&s[1..], &p[1..]),
        c => !s.is_empty() && s[0] == c && like_match_at(&s[1..], &p[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match_is_anchored() {
        assert!(like_match("abc", "abc"));
        assert!(!like_match("abc", "ab"));
        assert!(!like_match("abc", "bc"));
        assert!(!like_match("xabc", "abc"));
    }

    #[test]
    fn test_percent_runs() {
        assert!(like_match("abc", "%"));
        assert!(like_match("", "%"));
        assert!(like_match("abc", "a%"));
        assert!(like_match("abc", "%c"));
        assert!(like_match("abc", "%b%"));
        assert!(like_match("abc", "a%c"));
        assert!(like_match("ac", "a%c"));
        assert!(!like_match("ab", "a%c"));
    }

    #[test]
    fn test_underscore_single_char() {
        assert!(like_match("abc", "a_c"));
        assert!(!like_match("ac", "a_c"));
        assert!(!like_match("abbc", "a_c"));
        assert!(like_match("x", "_"));
        assert!(!like_match("", "_"));
    }

    #[test]
    fn test_mixed_wildcards() {
        assert!(like_match("database", "d%b_se"));
        assert!(like_match("aXbYc", "a_b_c"));
        assert!(!like_match("aXbYYc", "a_b_c"));
        assert!(like_match("aXbYYc", "a_b%c"));
    }

    #[test]
    fn test_empty_pattern() {
        assert!(like_match("", ""));
        assert!(!like_match("a", ""));
    }
}
