// File: src/core/alignment.rs
//! Alignment vector codec.
//!
//! A vector carries one tag per output position: `x` takes the next character
//! of the raw datum, anything else (indel `/`, exclude `.`, the `{` `}` of a
//! grapheme cluster, editorial text) is emitted as is.

use crate::core::types::{Alignment, Metathesis};
use crate::error::{CorrError, CorrResult};
use tracing::warn;

pub const HOLD: char = 'x';
pub const INDEL: char = '/';
pub const EXCLUDE: char = '.';
pub const CLUSTER_OPEN: char = '{';
pub const CLUSTER_CLOSE: char = '}';

/// Result of applying a vector, with any leftovers reported separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fused {
    pub text: String,
    /// Raw characters the vector never asked for. Appended to `text`.
    pub unconsumed: usize,
    /// `x` tags left over after the raw datum ran out.
    pub unmatched_holds: usize,
}

impl Fused {
    pub fn is_consistent(&self) -> bool {
        self.unconsumed == 0 && self.unmatched_holds == 0
    }
}

pub fn fuse_detailed(raw: &str, vector: &str) -> Fused {
    let mut text = String::with_capacity(raw.len() + vector.len());
    let mut raw_chars = raw.chars();
    let mut unmatched_holds = 0;

    for tag in vector.chars() {
        if tag == HOLD {
            match raw_chars.next() {
                Some(c) => text.push(c),
                None => unmatched_holds += 1,
            }
        } else {
            text.push(tag);
        }
    }

    let mut unconsumed = 0;
    for c in raw_chars {
        text.push(c);
        unconsumed += 1;
    }

    Fused {
        text,
        unconsumed,
        unmatched_holds,
    }
}

/// Applies `vector` to `raw`. Inconsistent legacy data is logged and fused on a
/// best-effort basis.
pub fn fuse(raw: &str, vector: &str) -> String {
    let fused = fuse_detailed(raw, vector);
    if !fused.is_consistent() {
        warn!(
            raw,
            vector,
            unconsumed = fused.unconsumed,
            unmatched_holds = fused.unmatched_holds,
            "alignment vector does not fit datum"
        );
    }
    fused.text
}

/// Strict variant of [`fuse`] for callers that must reject bad vectors.
pub fn fuse_checked(raw: &str, vector: &str) -> CorrResult<String> {
    let fused = fuse_detailed(raw, vector);
    if fused.is_consistent() {
        return Ok(fused.text);
    }
    let detail = if fused.unconsumed > 0 {
        format!("{} raw character(s) not covered by the vector", fused.unconsumed)
    } else {
        format!("{} hold tag(s) past the end of the datum", fused.unmatched_holds)
    };
    Err(CorrError::MalformedData {
        raw: raw.to_string(),
        vector: vector.to_string(),
        detail,
    })
}

/// Splits user-typed text into the raw datum and its vector.
pub fn extract_vector(annotated: &str) -> (String, String) {
    let mut raw = String::with_capacity(annotated.len());
    let mut vector = String::with_capacity(annotated.len());
    for c in annotated.chars() {
        if c == INDEL || c == EXCLUDE {
            vector.push(c);
        } else {
            raw.push(c);
            vector.push(HOLD);
        }
    }
    (raw, vector)
}

/// Splits aligned text into units, keeping `{...}` spans whole.
///
/// An unterminated `{` is emitted with whatever followed it so no input is
/// lost.
pub fn tokenize(aligned: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut buffer = String::new();
    let mut in_cluster = false;

    for c in aligned.chars() {
        if in_cluster {
            if c == CLUSTER_CLOSE {
                units.push(format!("{CLUSTER_OPEN}{buffer}{CLUSTER_CLOSE}"));
                buffer.clear();
                in_cluster = false;
            } else {
                buffer.push(c);
            }
        } else if c == CLUSTER_OPEN {
            in_cluster = true;
        } else {
            units.push(c.to_string());
        }
    }

    if in_cluster {
        units.push(format!("{CLUSTER_OPEN}{buffer}"));
    }
    units
}

/// Transposes two spans of units. Zero-length, overlapping or out-of-range
/// spans leave the units untouched.
pub fn apply_metathesis<T: Clone>(units: &[T], metathesis: &Metathesis) -> Vec<T> {
    let (a, b) = if metathesis.start1 <= metathesis.start2 {
        ((metathesis.start1, metathesis.len1), (metathesis.start2, metathesis.len2))
    } else {
        ((metathesis.start2, metathesis.len2), (metathesis.start1, metathesis.len1))
    };
    let (start1, len1) = a;
    let (start2, len2) = b;
    let end1 = start1 + len1;
    let end2 = start2 + len2;

    if len1 == 0 || len2 == 0 || end1 > start2 || end2 > units.len() {
        return units.to_vec();
    }

    let mut out = Vec::with_capacity(units.len());
    out.extend_from_slice(&units[..start1]);
    out.extend_from_slice(&units[start2..end2]);
    out.extend_from_slice(&units[end1..start2]);
    out.extend_from_slice(&units[start1..end1]);
    out.extend_from_slice(&units[end2..]);
    out
}

/// Display units for one alignment: fused, tokenized, then transposed.
pub fn aligned_units(raw: &str, alignment: &Alignment) -> Vec<String> {
    let units = tokenize(&fuse(raw, &alignment.vector));
    match &alignment.metathesis {
        Some(m) => apply_metathesis(&units, m),
        None => units,
    }
}

/// Vector with every hold tag and no markup, as made for a fresh datum.
pub fn all_hold(raw: &str) -> String {
    raw.chars().map(|_| HOLD).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn units(s: &[&str]) -> Vec<String> {
        s.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn extract_moves_marks_into_vector() {
        let (raw, vector) = extract_vector("ab/c.d");
        assert_eq!(raw, "abcd");
        assert_eq!(vector, "xx/x.x");
        assert_eq!(fuse(&raw, &vector), "ab/c.d");
    }

    #[test]
    fn fuse_copies_cluster_braces() {
        assert_eq!(fuse("tsa", "{xx}x"), "{ts}a");
        assert_eq!(tokenize(&fuse("tsa", "{xx}x")), units(&["{ts}", "a"]));
    }

    #[test]
    fn fuse_appends_leftover_raw() {
        let fused = fuse_detailed("abcd", "xx");
        assert_eq!(fused.text, "abcd");
        assert_eq!(fused.unconsumed, 2);
        assert!(!fused.is_consistent());
    }

    #[test]
    fn fuse_checked_rejects_extra_holds() {
        let err = fuse_checked("ab", "xxx").unwrap_err();
        assert!(err.to_string().contains("hold tag"));
        assert_eq!(fuse("ab", "xxx"), "ab");
    }

    #[test]
    fn tokenize_keeps_clusters_whole() {
        assert_eq!(tokenize("a{bc}d"), units(&["a", "{bc}", "d"]));
        assert_eq!(tokenize("{xy}"), units(&["{xy}"]));
        assert_eq!(tokenize(""), Vec::<String>::new());
    }

    #[test]
    fn tokenize_unterminated_cluster() {
        assert_eq!(tokenize("a{bc"), units(&["a", "{bc"]));
    }

    #[test]
    fn metathesis_swaps_spans_around_gap() {
        let input = units(&["a", "b", "c", "d", "e"]);
        let m = Metathesis { start1: 0, len1: 1, start2: 2, len2: 1 };
        assert_eq!(apply_metathesis(&input, &m), units(&["c", "b", "a", "d", "e"]));
    }

    #[test]
    fn metathesis_normalizes_span_order() {
        let input = units(&["a", "b", "c", "d", "e"]);
        let m = Metathesis { start1: 3, len1: 2, start2: 0, len2: 1 };
        assert_eq!(apply_metathesis(&input, &m), units(&["d", "e", "b", "c", "a"]));
    }

    #[test]
    fn metathesis_degenerate_spans_are_ignored() {
        let input = units(&["a", "b", "c"]);
        let overlapping = Metathesis { start1: 0, len1: 2, start2: 1, len2: 1 };
        let past_end = Metathesis { start1: 0, len1: 1, start2: 2, len2: 5 };
        assert_eq!(apply_metathesis(&input, &overlapping), input);
        assert_eq!(apply_metathesis(&input, &past_end), input);
    }

    #[test]
    fn aligned_units_applies_metathesis() {
        let alignment = Alignment {
            vector: "x{xx}x".into(),
            metathesis: Some(Metathesis { start1: 0, len1: 1, start2: 1, len2: 1 }),
            ..Default::default()
        };
        assert_eq!(aligned_units("ktsa", &alignment), units(&["{ts}", "k", "a"]));
    }

    proptest! {
        #[test]
        fn extract_then_fuse_round_trips(s in "[a-z/.]{0,24}") {
            let (raw, vector) = extract_vector(&s);
            prop_assert_eq!(fuse_checked(&raw, &vector).unwrap(), s);
        }

        #[test]
        fn all_hold_vector_is_identity(s in "[a-zəŋ]{0,16}") {
            prop_assert_eq!(fuse(&s, &all_hold(&s)), s);
        }
    }
}
