//! Levenshtein edit distance between scraped and stored titles.
//!
//! Scholar does not expose a stable per-publication identifier without
//! authentication, so result titles are linked back to local records purely
//! by edit distance. The metric must be the exact Levenshtein distance (the
//! acceptance threshold in the fetcher is calibrated against it), hence no
//! similarity-ratio shortcuts.

/// Minimum number of single-character insertions, deletions, and
/// substitutions needed to turn `s` into `t`.
///
/// Rolling two-row dynamic program: O(n*m) time, O(n) memory. Operates on
/// Unicode scalar values, so accented characters count as one edit.
pub fn levenshtein(s: &str, t: &str) -> usize {
    let s: Vec<char> = s.chars().collect();
    let t: Vec<char> = t.chars().collect();
    let n = s.len();
    let m = t.len();
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut cur: Vec<usize> = vec![0; n + 1];

    for j in 1..=m {
        cur[0] = j;
        let t_j = t[j - 1];
        for i in 1..=n {
            let cost = if s[i - 1] == t_j { 0 } else { 1 };
            cur[i] = (cur[i - 1] + 1).min(prev[i] + 1).min(prev[i - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitten_sitting() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn test_empty_left() {
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_empty_right() {
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_both_empty() {
        assert_eq!(levenshtein("", ""), 0);
    }

    #[test]
    fn test_identity() {
        assert_eq!(levenshtein("formal verification", "formal verification"), 0);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("kitten", "sitting"),
            ("flaw", "lawn"),
            ("gumbo", "gambol"),
            ("", "nonempty"),
        ];
        for (a, b) in pairs {
            assert_eq!(levenshtein(a, b), levenshtein(b, a));
        }
    }

    #[test]
    fn test_triangle_inequality() {
        let triples = [
            ("kitten", "sitting", "fitting"),
            ("abc", "xyz", "axc"),
            ("feature model", "feature models", "featured modes"),
        ];
        for (a, b, c) in triples {
            assert!(levenshtein(a, c) <= levenshtein(a, b) + levenshtein(b, c));
        }
    }

    #[test]
    fn test_single_substitution() {
        assert_eq!(levenshtein("flaw", "claw"), 1);
    }

    #[test]
    fn test_unicode_counts_scalar_values() {
        // One accented character differs, one edit
        assert_eq!(levenshtein("thüm", "thum"), 1);
    }
}
