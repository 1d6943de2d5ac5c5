//! Wildcard matching over trie edges
//!
//! Patterns carry a single `.` marker. The byte after it picks the repetition:
//!
//! | pattern | matches                  |
//! |---------|--------------------------|
//! | `a.b`   | exactly one byte         |
//! | `a.?b`  | zero or one byte         |
//! | `a.*b`  | any number of bytes      |
//! | `a.+b`  | at least one byte        |

use std::collections::BTreeMap;

use super::navigator::{Cursor, Trie, Visit};
use super::types::{bytes_match, NodeId, NodeRecord};
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

/// A token split at its wildcard marker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WildcardPattern {
    pub before: Vec<u8>,
    pub after: Vec<u8>,
    pub repeat: Repeat,
}

impl WildcardPattern {
    /// Split `token` at its first `.`; `None` when there is no marker
    pub fn parse(token: &[u8]) -> Option<Self> {
        let dot = token.iter().position(|&b| b == b'.')?;
        let (repeat, after_start) = match token.get(dot + 1) {
            Some(b'*') => (Repeat::ZeroOrMore, dot + 2),
            Some(b'+') => (Repeat::OneOrMore, dot + 2),
            Some(b'?') => (Repeat::ZeroOrOne, dot + 2),
            _ => (Repeat::One, dot + 1),
        };

        Some(Self {
            before: token[..dot].to_vec(),
            after: token[after_start..].to_vec(),
            repeat,
        })
    }
}

/// Token nodes matched by `pattern`, in no particular order
pub fn wildcard_nodes(trie: &Trie, pattern: &WildcardPattern, folded: bool) -> Result<Vec<NodeRecord>> {
    let mut found: BTreeMap<NodeId, NodeRecord> = BTreeMap::new();
    let starts = trie.follow(trie.root()?, &pattern.before, folded)?;

    for start in starts {
        match pattern.repeat {
            Repeat::One => single(trie, &start, &pattern.after, folded, &mut found)?,
            Repeat::ZeroOrOne => {
                collect_at(trie, start.clone(), &pattern.after, folded, &mut found)?;
                single(trie, &start, &pattern.after, folded, &mut found)?;
            }
            Repeat::ZeroOrMore => suffix_walk(trie, &start, &pattern.after, 0, folded, &mut found)?,
            Repeat::OneOrMore => suffix_walk(trie, &start, &pattern.after, 1, folded, &mut found)?,
        }
    }

    Ok(found.into_values().collect())
}

fn collect_at(
    trie: &Trie,
    start: Cursor,
    rest: &[u8],
    folded: bool,
    found: &mut BTreeMap<NodeId, NodeRecord>,
) -> Result<()> {
    for cursor in trie.follow(start, rest, folded)? {
        if let Some(node) = cursor.token_node() {
            found.entry(node.id).or_insert_with(|| node.clone());
        }
    }
    Ok(())
}

fn single(
    trie: &Trie,
    start: &Cursor,
    after: &[u8],
    folded: bool,
    found: &mut BTreeMap<NodeId, NodeRecord>,
) -> Result<()> {
    for (_, cursor) in trie.step(start)? {
        collect_at(trie, cursor, after, folded, found)?;
    }
    Ok(())
}

/// Tokens below `start` whose remainder ends with `after` and is at least
/// `min_extra` bytes longer than it
fn suffix_walk(
    trie: &Trie,
    start: &Cursor,
    after: &[u8],
    min_extra: usize,
    folded: bool,
    found: &mut BTreeMap<NodeId, NodeRecord>,
) -> Result<()> {
    trie.walk(start, |path, node| {
        if node.holds_token()
            && path.len() >= after.len() + min_extra
            && ends_with(path, after, folded)
        {
            found.entry(node.id).or_insert_with(|| node.clone());
        }
        Ok(Visit::Descend)
    })
}

fn ends_with(path: &[u8], suffix: &[u8], folded: bool) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| bytes_match(*a, *b, folded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use crate::trie::store::RecordStore;
    use crate::trie::writer::TrieBuilder;

    struct Fixture {
        trie: Trie,
        tokens: Vec<&'static str>,
    }

    impl Fixture {
        fn new(tokens: &[&'static str], case_sensitive: bool) -> Self {
            let mut builder =
                TrieBuilder::new(BuildSettings::default().with_case_sensitive(case_sensitive));
            for (doc, token) in tokens.iter().enumerate() {
                builder.add(token.as_bytes(), doc as u32, 0).unwrap();
            }
            let image = builder.build().unwrap();
            let trie = Trie::new(
                RecordStore::from_image(&image).unwrap(),
                image.meta.layout,
                case_sensitive,
            );
            Self {
                trie,
                tokens: tokens.to_vec(),
            }
        }

        /// Matched tokens, sorted
        fn matches(&self, pattern: &str, folded: bool) -> Vec<&'static str> {
            let pattern = WildcardPattern::parse(pattern.as_bytes()).unwrap();
            let nodes = wildcard_nodes(&self.trie, &pattern, folded).unwrap();
            let postings = self.trie.union_postings(&nodes).unwrap();
            let mut tokens: Vec<&'static str> = postings
                .iter()
                .map(|p| self.tokens[p.doc_id as usize])
                .collect();
            tokens.sort();
            tokens.dedup();
            tokens
        }
    }

    #[test]
    fn test_parse() {
        let p = WildcardPattern::parse(b"c.*t").unwrap();
        assert_eq!(p.before, b"c".to_vec());
        assert_eq!(p.after, b"t".to_vec());
        assert_eq!(p.repeat, Repeat::ZeroOrMore);

        let p = WildcardPattern::parse(b"ab.").unwrap();
        assert_eq!(p.repeat, Repeat::One);
        assert!(p.after.is_empty());

        assert_eq!(WildcardPattern::parse(b".+").unwrap().repeat, Repeat::OneOrMore);
        assert_eq!(WildcardPattern::parse(b"x.?y").unwrap().repeat, Repeat::ZeroOrOne);
        assert!(WildcardPattern::parse(b"plain").is_none());
    }

    #[test]
    fn test_zero_or_more() {
        let f = Fixture::new(&["cat", "cost", "ct", "dog"], false);
        assert_eq!(f.matches("c.*t", false), vec!["cat", "cost", "ct"]);
    }

    #[test]
    fn test_one_or_more() {
        let f = Fixture::new(&["cat", "cost", "ct", "dog"], false);
        assert_eq!(f.matches("c.+t", false), vec!["cat", "cost"]);
    }

    #[test]
    fn test_single_byte() {
        let f = Fixture::new(&["cat", "cut", "cart", "ct", "cats"], false);
        assert_eq!(f.matches("c.t", false), vec!["cat", "cut"]);
        assert_eq!(f.matches("ca.", false), vec!["cat"]);
    }

    #[test]
    fn test_zero_or_one() {
        let f = Fixture::new(&["color", "colour", "colouur"], false);
        assert_eq!(f.matches("colo.?r", false), vec!["color", "colour"]);
    }

    #[test]
    fn test_match_everything() {
        let f = Fixture::new(&["a", "bb", "ccc"], false);
        assert_eq!(f.matches(".*", false), vec!["a", "bb", "ccc"]);
        assert_eq!(f.matches(".+", false), vec!["a", "bb", "ccc"]);
        assert_eq!(f.matches(".", false), vec!["a"]);
    }

    #[test]
    fn test_suffix_inside_a_label() {
        let f = Fixture::new(&["string", "strong", "stringent", "sing"], false);
        assert_eq!(f.matches("s.*ng", false), vec!["sing", "string", "strong"]);
        assert_eq!(f.matches("str.*", false), vec!["string", "stringent", "strong"]);
    }

    #[test]
    fn test_folded_wildcard() {
        let f = Fixture::new(&["Cat", "cOt", "cut", "dog"], true);
        assert_eq!(f.matches("c.t", false), vec!["cOt", "cut"]);
        assert_eq!(f.matches("C.t", false), vec!["Cat"]);
        assert_eq!(f.matches("C.T", true), vec!["Cat", "cOt", "cut"]);
        assert_eq!(f.matches("c.*T", true), vec!["Cat", "cOt", "cut"]);
    }
}
