//! Range queries over numeric and name tokens
//!
//! Numeric ranges walk the trie digit by digit. The number of significant
//! integer digits (the "level") bounds every subtree: a path with more
//! integer digits than `high` can never lead back into the range, and once
//! the decimal point is passed the integer level is fixed.
//!
//! Name-token ranges are a pre-order walk between `low` and `high` in tree
//! order. A case-insensitive range compares folded bytes; tree order sorts
//! by folded byte first, so the same pruning holds.

use std::cmp::Ordering;

use super::navigator::{Trie, Visit};
use super::types::{bytes_match, fold, tree_cmp, NodeRecord};
use crate::error::TextrieError;
use crate::Result;

/// Non-negative decimal split at its point, without insignificant zeros
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimal {
    int: Vec<u8>,
    frac: Vec<u8>,
}

impl Decimal {
    /// Parse digits with at most one `.`; at least one digit is required
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (int, frac) = match bytes.iter().position(|&b| b == b'.') {
            Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
            None => (bytes, &[][..]),
        };
        if int.is_empty() && frac.is_empty() {
            return None;
        }
        if !int.iter().chain(frac).all(u8::is_ascii_digit) {
            return None;
        }

        let first_significant = int.iter().position(|&b| b != b'0').unwrap_or(int.len());
        let last_significant = frac.iter().rposition(|&b| b != b'0').map_or(0, |p| p + 1);
        Some(Self {
            int: int[first_significant..].to_vec(),
            frac: frac[..last_significant].to_vec(),
        })
    }

    /// Number of significant integer digits
    pub fn level(&self) -> usize {
        self.int.len()
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.int
            .len()
            .cmp(&other.int.len())
            .then_with(|| self.int.cmp(&other.int))
            .then_with(|| self.frac.cmp(&other.frac))
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bytes allowed in a name token
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':') || b >= 0x80
}

fn is_name_token(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|&b| is_name_byte(b))
}

/// Bounds of a range query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeBounds {
    Numeric { low: Decimal, high: Decimal },
    Text { low: Vec<u8>, high: Vec<u8> },
}

impl RangeBounds {
    /// Numeric when both bounds are numbers, textual when both are name
    /// tokens; anything else is rejected
    pub fn classify(low: &[u8], high: &[u8]) -> Result<Self> {
        if let (Some(low), Some(high)) = (Decimal::parse(low), Decimal::parse(high)) {
            return Ok(RangeBounds::Numeric { low, high });
        }
        if is_name_token(low) && is_name_token(high) {
            return Ok(RangeBounds::Text {
                low: low.to_vec(),
                high: high.to_vec(),
            });
        }
        Err(TextrieError::UnsupportedQueryShape(format!(
            "range bounds '{}' and '{}' are neither numbers nor name tokens",
            String::from_utf8_lossy(low),
            String::from_utf8_lossy(high)
        )))
    }
}

/// Token nodes inside `bounds`, inclusive. `folded` ignores ASCII case for
/// name-token bounds.
pub fn range_nodes(trie: &Trie, bounds: &RangeBounds, folded: bool) -> Result<Vec<NodeRecord>> {
    let mut found = Vec::new();
    let root = trie.root()?;

    match bounds {
        RangeBounds::Numeric { low, high } => {
            if low > high {
                return Ok(found);
            }
            trie.walk(&root, |path, node| {
                let Some(level) = numeric_level(path) else {
                    return Ok(Visit::Prune);
                };
                if level.digits > high.level() || (level.seen_dot && level.digits < low.level()) {
                    return Ok(Visit::Prune);
                }
                if node.holds_token() {
                    if let Some(value) = Decimal::parse(path) {
                        if *low <= value && value <= *high {
                            found.push(node.clone());
                        }
                    }
                }
                Ok(Visit::Descend)
            })?
        }
        RangeBounds::Text { low, high } => {
            if text_cmp(low, high, folded) == Ordering::Greater {
                return Ok(found);
            }
            trie.walk(&root, |path, node| {
                if text_cmp(path, high, folded) == Ordering::Greater {
                    return Ok(Visit::Prune);
                }
                let below_low = text_cmp(path, low, folded) == Ordering::Less;
                if below_low && !has_prefix(low, path, folded) {
                    return Ok(Visit::Prune);
                }
                if node.holds_token() && !below_low {
                    found.push(node.clone());
                }
                Ok(Visit::Descend)
            })?
        }
    }

    Ok(found)
}

fn text_cmp(a: &[u8], b: &[u8], folded: bool) -> Ordering {
    if folded {
        a.iter().map(|&x| fold(x)).cmp(b.iter().map(|&x| fold(x)))
    } else {
        tree_cmp(a, b)
    }
}

fn has_prefix(bytes: &[u8], prefix: &[u8], folded: bool) -> bool {
    bytes.len() >= prefix.len()
        && bytes.iter().zip(prefix).all(|(&a, &b)| bytes_match(a, b, folded))
}

struct Level {
    digits: usize,
    seen_dot: bool,
}

/// Significant integer digits of a numeric path prefix; `None` once the
/// path can no longer be a number
fn numeric_level(path: &[u8]) -> Option<Level> {
    let mut level = Level {
        digits: 0,
        seen_dot: false,
    };
    for &b in path {
        match b {
            b'.' if !level.seen_dot => level.seen_dot = true,
            b'0'..=b'9' if level.seen_dot => {}
            b'0' if level.digits == 0 => {}
            b'0'..=b'9' => level.digits += 1,
            _ => return None,
        }
    }
    Some(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use crate::trie::store::RecordStore;
    use crate::trie::writer::TrieBuilder;

    fn matched<'a>(tokens: &[&'a str], low: &str, high: &str) -> Result<Vec<&'a str>> {
        matched_with(tokens, low, high, false)
    }

    fn matched_with<'a>(
        tokens: &[&'a str],
        low: &str,
        high: &str,
        folded: bool,
    ) -> Result<Vec<&'a str>> {
        let mut builder = TrieBuilder::new(BuildSettings::default().with_case_sensitive(true));
        for (doc, token) in tokens.iter().enumerate() {
            builder.add(token.as_bytes(), doc as u32, 0).unwrap();
        }
        let image = builder.build().unwrap();
        let trie = Trie::new(RecordStore::from_image(&image).unwrap(), image.meta.layout, true);

        let bounds = RangeBounds::classify(low.as_bytes(), high.as_bytes())?;
        let nodes = range_nodes(&trie, &bounds, folded)?;
        let mut out: Vec<&str> = trie
            .union_postings(&nodes)?
            .iter()
            .map(|p| tokens[p.doc_id as usize])
            .collect();
        out.sort();
        Ok(out)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::parse(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_decimal_order() {
        assert!(dec("9") < dec("10"));
        assert!(dec("007") == dec("7"));
        assert!(dec("2.5") < dec("2.50001"));
        assert_eq!(dec("2.50"), dec("2.5"));
        assert!(dec("0.9") < dec("1"));
        assert!(dec(".5") < dec("1"));
        assert_eq!(dec("120").level(), 3);
        assert!(Decimal::parse(b"1.2.3").is_none());
        assert!(Decimal::parse(b".").is_none());
        assert!(Decimal::parse(b"12a").is_none());
    }

    #[test]
    fn test_numeric_range() {
        let tokens = ["1", "3", "5", "7", "9"];
        assert_eq!(matched(&tokens, "3", "7").unwrap(), vec!["3", "5", "7"]);
    }

    #[test]
    fn test_numeric_range_levels() {
        let tokens = ["2", "9", "10", "42", "99", "100", "1000", "3a", "x", "07", "55.5", "9.75"];
        assert_eq!(
            matched(&tokens, "8", "99").unwrap(),
            vec!["10", "42", "55.5", "9", "9.75", "99"]
        );
        assert_eq!(matched(&tokens, "7", "7").unwrap(), vec!["07"]);
        assert_eq!(matched(&tokens, "9.5", "10").unwrap(), vec!["10", "9.75"]);
    }

    #[test]
    fn test_text_range() {
        let tokens = ["a", "apple", "b", "banana", "c", "d", "dz", "e"];
        assert_eq!(matched(&tokens, "b", "d").unwrap(), vec!["b", "banana", "c", "d"]);
        assert_eq!(matched(&tokens, "ap", "b").unwrap(), vec!["apple", "b"]);
    }

    #[test]
    fn test_text_range_tree_order() {
        let tokens = ["ab", "Ab", "aC", "b"];
        // tree order is ab, aC, Ab, b
        assert_eq!(matched(&tokens, "ab", "aC").unwrap(), vec!["aC", "ab"]);
        assert_eq!(matched(&tokens, "ab", "Ab").unwrap(), vec!["Ab", "aC", "ab"]);
    }

    #[test]
    fn test_text_range_ignoring_case() {
        let tokens = ["ab", "Ab", "aC", "AD", "b", "B", "a"];
        assert_eq!(
            matched_with(&tokens, "AB", "ac", true).unwrap(),
            vec!["Ab", "aC", "ab"]
        );
        assert_eq!(matched_with(&tokens, "B", "b", true).unwrap(), vec!["B", "b"]);
        // inverted only once case is considered
        assert!(matched(&tokens, "B", "b").unwrap().is_empty());
        assert!(matched_with(&tokens, "c", "A", true).unwrap().is_empty());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let tokens = ["1", "5", "x"];
        assert!(matched(&tokens, "7", "3").unwrap().is_empty());
        assert!(matched(&tokens, "y", "a").unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_bounds() {
        let err = matched(&["1"], "1", "two words").unwrap_err();
        assert!(matches!(err, TextrieError::UnsupportedQueryShape(_)));
        assert!(RangeBounds::classify(b"", b"5").is_err());
    }
}
