//! Core types for the on-disk trie

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dense trie node identifier, an index into the offset directory
pub type NodeId = u32;

/// The root node is always written first
pub const ROOT: NodeId = 0;

/// Largest value the 5-byte posting pointer can hold
pub const MAX_POSTING_POINTER: u64 = (1 << 40) - 1;

/// Longest edge label a node record can carry (1-byte length prefix)
pub const MAX_LABEL_LEN: usize = u8::MAX as usize;

/// A single token occurrence
///
/// Ordering is by document id, then position, which is the order posting
/// lists are stored and merged in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Posting {
    /// Document node id in the backing store
    pub doc_id: u32,
    /// Word position inside the document node
    pub position: u32,
}

impl Posting {
    pub fn new(doc_id: u32, position: u32) -> Self {
        Self { doc_id, position }
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.doc_id, self.position)
    }
}

/// Entry of a node's child list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildRef {
    pub id: NodeId,
    /// First byte of the child's label
    pub first: u8,
}

/// Decoded trie node record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    /// Edge text leading into this node, empty only at the root
    pub label: Vec<u8>,
    /// Children in tree order (see [`order_key`])
    pub children: Vec<ChildRef>,
    /// Occurrences of the token ending here, 0 for purely internal nodes
    pub posting_count: u32,
    /// Offset into the posting region, valid iff `posting_count > 0`
    pub posting_pointer: u64,
}

impl NodeRecord {
    pub fn is_inner(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn holds_token(&self) -> bool {
        self.posting_count > 0
    }
}

/// Physical layout of every posting list in an index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostingLayout {
    /// All document deltas first, then all positions
    #[default]
    Grouped,
    /// (document delta, position) pairs alternate; decodable lazily
    Interleaved,
}

impl fmt::Display for PostingLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostingLayout::Grouped => write!(f, "grouped"),
            PostingLayout::Interleaved => write!(f, "interleaved"),
        }
    }
}

impl FromStr for PostingLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grouped" => Ok(PostingLayout::Grouped),
            "interleaved" | "iterative" => Ok(PostingLayout::Interleaved),
            other => Err(format!("unknown posting layout '{}'", other)),
        }
    }
}

/// ASCII case folding used for case-insensitive matching
#[inline]
pub fn fold(byte: u8) -> u8 {
    byte.to_ascii_lowercase()
}

#[inline]
pub fn bytes_match(a: u8, b: u8, folded: bool) -> bool {
    if folded {
        fold(a) == fold(b)
    } else {
        a == b
    }
}

/// Sort key of a child's first byte.
///
/// Case variants of a letter are adjacent with the lowercase one first
/// (`a, A, b, B, ...`). Trees built case-folded contain no uppercase letters,
/// so the key degenerates to plain byte order there.
#[inline]
pub fn order_key(byte: u8) -> (u8, bool) {
    (fold(byte), byte.is_ascii_uppercase())
}

/// Compare two byte strings in tree (pre-order) order
pub fn tree_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = order_key(*x).cmp(&order_key(*y));
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_posting_order() {
        let mut postings = vec![
            Posting::new(3, 1),
            Posting::new(1, 9),
            Posting::new(1, 2),
        ];
        postings.sort();
        assert_eq!(
            postings,
            vec![Posting::new(1, 2), Posting::new(1, 9), Posting::new(3, 1)]
        );
        assert_eq!(format!("{}", Posting::new(4, 2)), "4:2");
    }

    #[test]
    fn test_order_key_interleaves_case() {
        let mut bytes = vec![b'B', b'a', b'b', b'A', b'1'];
        bytes.sort_by_key(|b| order_key(*b));
        assert_eq!(bytes, vec![b'1', b'a', b'A', b'b', b'B']);
    }

    #[test]
    fn test_tree_cmp() {
        assert_eq!(tree_cmp(b"ab", b"abc"), Ordering::Less);
        assert_eq!(tree_cmp(b"aB", b"ab"), Ordering::Greater);
        assert_eq!(tree_cmp(b"Ab", b"b"), Ordering::Less);
        assert_eq!(tree_cmp(b"xyz", b"xyz"), Ordering::Equal);
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("grouped".parse::<PostingLayout>().unwrap(), PostingLayout::Grouped);
        assert_eq!(
            "Iterative".parse::<PostingLayout>().unwrap(),
            PostingLayout::Interleaved
        );
        assert!("columnar".parse::<PostingLayout>().is_err());
        assert_eq!(PostingLayout::Interleaved.to_string(), "interleaved");
    }
}
