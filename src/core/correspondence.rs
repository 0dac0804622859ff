//! Correspondence set comparisons.
//!
//! Segments are compared unit by unit after grapheme tokenization, so `{ts}`
//! is one symbol. The ignore symbol `.` matches anything when testing
//! conformability but not when testing identity.

use crate::core::alignment::tokenize;
use crate::core::types::CorrespondenceSet;

pub const IGNORE: &str = ".";

pub fn count_varieties(segments: &str) -> usize {
    tokenize(segments).iter().filter(|u| *u != IGNORE).count()
}

pub fn segments_identical(a: &str, b: &str) -> bool {
    tokenize(a) == tokenize(b)
}

pub fn segments_conformable(a: &str, b: &str) -> bool {
    let left = tokenize(a);
    let right = tokenize(b);
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .all(|(l, r)| l == IGNORE || r == IGNORE || l == r)
}

impl CorrespondenceSet {
    pub fn is_identical(&self, other: &CorrespondenceSet) -> bool {
        segments_identical(self.segments(), other.segments())
    }

    pub fn is_conformable(&self, other: &CorrespondenceSet) -> bool {
        segments_conformable(self.segments(), other.segments())
    }

    pub fn units(&self) -> Vec<String> {
        tokenize(self.segments())
    }
}

/// Joins per-variety units into a set string, `.` standing in for gaps.
pub fn join_segments<I, S>(units: I) -> String
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    units
        .into_iter()
        .map(|u| match u {
            Some(s) if !s.as_ref().is_empty() => s.as_ref().to_string(),
            _ => IGNORE.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ignore_matches_any_unit() {
        assert!(segments_conformable("a.c", "abc"));
        assert!(segments_conformable("a.c", "a{bh}c"));
        assert!(segments_conformable("...", "xyz"));
        assert!(!segments_conformable("a.c", "abd"));
    }

    #[test]
    fn length_mismatch_is_never_conformable() {
        assert!(!segments_conformable("a.c", "a.cd"));
        assert!(!segments_conformable("", "."));
    }

    #[test]
    fn identity_is_stricter_than_conformability() {
        assert!(segments_conformable("p.b", "pfb"));
        assert!(!segments_identical("p.b", "pfb"));
        assert!(segments_identical("p{ts}b", "p{ts}b"));
    }

    #[test]
    fn clusters_compare_as_single_units() {
        assert!(!segments_conformable("{ts}", "ts"));
        assert!(segments_conformable("{ts}a", ".a"));
    }

    #[test]
    fn variety_count_skips_ignores() {
        assert_eq!(count_varieties("p.{ph}."), 2);
        assert_eq!(count_varieties(""), 0);
    }

    #[test]
    fn join_fills_gaps_with_ignore() {
        let joined = join_segments(vec![Some("p"), None, Some("{ph}"), Some("")]);
        assert_eq!(joined, "p.{ph}.");
    }

    proptest! {
        #[test]
        fn conformability_is_reflexive(a in "[ab.]{0,8}") {
            prop_assert!(segments_conformable(&a, &a));
        }

        #[test]
        fn conformability_is_symmetric(a in "[ab.]{0,6}", b in "[ab.]{0,6}") {
            prop_assert_eq!(segments_conformable(&a, &b), segments_conformable(&b, &a));
        }
    }
}
