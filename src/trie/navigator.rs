//! Descent over the on-disk trie
//!
//! A [`Cursor`] is a position inside the trie: a node plus how many bytes of
//! its label have been consumed. Every query engine is built from three
//! moves: [`Trie::follow`] a literal byte string, [`Trie::step`] over one
//! arbitrary byte, and [`Trie::walk`] a subtree in pre-order.

use tracing::warn;

use super::algebra::union_all;
use super::codec::decode_node;
use super::postings::{decode_postings, InterleavedCursor, PostingIter};
use super::store::RecordStore;
use super::types::{bytes_match, fold, order_key, ChildRef, NodeId, NodeRecord, Posting, PostingLayout, ROOT};
use crate::error::TextrieError;
use crate::Result;

/// Deepest node chain a traversal follows before reporting a cycle
pub const MAX_DEPTH: usize = 1024;

/// Position inside the trie
#[derive(Clone, Debug)]
pub struct Cursor {
    pub node: NodeRecord,
    /// Bytes of `node.label` already matched
    pub offset: usize,
}

impl Cursor {
    /// True when the cursor sits at the end of its node's label
    pub fn at_node_end(&self) -> bool {
        self.offset == self.node.label.len()
    }

    /// The node whose token ends exactly here, if any
    pub fn token_node(&self) -> Option<&NodeRecord> {
        if self.at_node_end() && self.node.holds_token() {
            Some(&self.node)
        } else {
            None
        }
    }
}

/// Whether [`Trie::walk`] continues below a node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Prune,
}

/// Read access to a trie stored in a [`RecordStore`]
pub struct Trie {
    store: RecordStore,
    layout: PostingLayout,
    case_sensitive: bool,
}

impl Trie {
    pub fn new(store: RecordStore, layout: PostingLayout, case_sensitive: bool) -> Self {
        Self {
            store,
            layout,
            case_sensitive,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn layout(&self) -> PostingLayout {
        self.layout
    }

    /// Whether tokens were stored with their original case
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn node(&self, id: NodeId) -> Result<NodeRecord> {
        let bytes = self.store.record_bytes(id)?;
        decode_node(id, &bytes).map_err(|e| {
            warn!("Corrupt trie record {}: {}", id, e);
            e
        })
    }

    pub fn root(&self) -> Result<Cursor> {
        Ok(Cursor {
            node: self.node(ROOT)?,
            offset: 0,
        })
    }

    fn child(&self, child: &ChildRef) -> Result<NodeRecord> {
        let node = self.node(child.id)?;
        if node.label.first() != Some(&child.first) {
            warn!("Child {} does not start with its indexed byte", child.id);
            return Err(TextrieError::corrupt(format!(
                "node {} is indexed under byte {:#04x} but its label starts differently",
                child.id, child.first
            )));
        }
        Ok(node)
    }

    /// Children whose first label byte equals `byte`, or case-folds to it
    /// when `folded`. At most two entries (lowercase first) when folded.
    pub fn children_matching<'n>(node: &'n NodeRecord, byte: u8, folded: bool) -> &'n [ChildRef] {
        let children = &node.children;
        if folded {
            let target = fold(byte);
            let start = children.partition_point(|c| fold(c.first) < target);
            let end = start
                + children[start..]
                    .iter()
                    .take_while(|c| fold(c.first) == target)
                    .count();
            &children[start..end]
        } else {
            match children.binary_search_by_key(&order_key(byte), |c| order_key(c.first)) {
                Ok(idx) => &children[idx..idx + 1],
                Err(_) => &[],
            }
        }
    }

    /// Consume `bytes` from `start`, returning every position reached.
    ///
    /// Without folding there is at most one result. With folding, case
    /// variants of each byte are explored side by side.
    pub fn follow(&self, start: Cursor, bytes: &[u8], folded: bool) -> Result<Vec<Cursor>> {
        let mut cursors = vec![start];

        for &byte in bytes {
            let mut next = Vec::with_capacity(cursors.len());
            for cursor in cursors {
                if !cursor.at_node_end() {
                    if bytes_match(cursor.node.label[cursor.offset], byte, folded) {
                        next.push(Cursor {
                            offset: cursor.offset + 1,
                            node: cursor.node,
                        });
                    }
                    continue;
                }
                for child in Self::children_matching(&cursor.node, byte, folded) {
                    next.push(Cursor {
                        node: self.child(child)?,
                        offset: 1,
                    });
                }
            }
            if next.is_empty() {
                return Ok(next);
            }
            cursors = next;
        }

        Ok(cursors)
    }

    /// Every position one arbitrary byte past `cursor`
    pub fn step(&self, cursor: &Cursor) -> Result<Vec<(u8, Cursor)>> {
        if !cursor.at_node_end() {
            return Ok(vec![(
                cursor.node.label[cursor.offset],
                Cursor {
                    node: cursor.node.clone(),
                    offset: cursor.offset + 1,
                },
            )]);
        }

        cursor
            .node
            .children
            .iter()
            .map(|child| {
                Ok((
                    child.first,
                    Cursor {
                        node: self.child(child)?,
                        offset: 1,
                    },
                ))
            })
            .collect()
    }

    /// Nodes holding `token`; more than one only when `folded` and several
    /// case variants are stored
    pub fn find_tokens(&self, token: &[u8], folded: bool) -> Result<Vec<NodeRecord>> {
        if token.is_empty() {
            return Ok(Vec::new());
        }
        let cursors = self.follow(self.root()?, token, folded)?;
        Ok(cursors
            .into_iter()
            .filter_map(|cursor| cursor.token_node().cloned())
            .collect())
    }

    /// Pre-order traversal of everything below `start`.
    ///
    /// `visit` sees each node once with the bytes consumed since `start`,
    /// and decides whether its children are visited.
    pub fn walk<F>(&self, start: &Cursor, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &NodeRecord) -> Result<Visit>,
    {
        let mut stack = vec![(
            start.node.clone(),
            start.node.label[start.offset..].to_vec(),
            0usize,
        )];

        while let Some((node, path, depth)) = stack.pop() {
            if visit(&path, &node)? == Visit::Prune {
                continue;
            }
            if depth >= MAX_DEPTH && node.is_inner() {
                return Err(TextrieError::corrupt(format!(
                    "trie deeper than {} nodes below node {}",
                    MAX_DEPTH, start.node.id
                )));
            }
            for child in node.children.iter().rev() {
                let child_node = self.child(child)?;
                let mut child_path = Vec::with_capacity(path.len() + child_node.label.len());
                child_path.extend_from_slice(&path);
                child_path.extend_from_slice(&child_node.label);
                stack.push((child_node, child_path, depth + 1));
            }
        }

        Ok(())
    }

    /// Decode the full posting list of a token node
    pub fn postings_of(&self, node: &NodeRecord) -> Result<Vec<Posting>> {
        self.postings_at(node.posting_pointer, node.posting_count, 0)
    }

    pub fn postings_at(&self, pointer: u64, count: u32, doc_base: u32) -> Result<Vec<Posting>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut cursor = self.store.posting_cursor(pointer);
        decode_postings(&mut cursor, count, self.layout, doc_base)
    }

    /// Union of the posting lists of `nodes`; a node listed twice counts once
    pub fn union_postings(&self, nodes: &[NodeRecord]) -> Result<Vec<Posting>> {
        let mut seen = std::collections::BTreeSet::new();
        let mut lists = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node.holds_token() && seen.insert(node.id) {
                lists.push(self.postings_of(node)?);
            }
        }
        Ok(union_all(lists))
    }

    /// Posting list as an iterator, decoded lazily when the layout allows
    pub fn iter_postings_at(&self, pointer: u64, count: u32, doc_base: u32) -> Result<PostingIter<'_>> {
        if count == 0 {
            return Ok(PostingIter::Empty);
        }
        match self.layout {
            PostingLayout::Interleaved => Ok(PostingIter::Lazy(InterleavedCursor::new(
                self.store.posting_cursor(pointer),
                count,
                doc_base,
            ))),
            PostingLayout::Grouped => Ok(PostingIter::from_vec(
                self.postings_at(pointer, count, doc_base)?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use crate::trie::codec::encode_node;
    use crate::trie::writer::TrieBuilder;

    fn trie_of(tokens: &[&str], case_sensitive: bool) -> Trie {
        let mut builder = TrieBuilder::new(BuildSettings::default().with_case_sensitive(case_sensitive));
        for (doc, token) in tokens.iter().enumerate() {
            builder.add(token.as_bytes(), doc as u32, 0).unwrap();
        }
        let image = builder.build().unwrap();
        Trie::new(
            RecordStore::from_image(&image).unwrap(),
            image.meta.layout,
            case_sensitive,
        )
    }

    fn tokens_below(trie: &Trie, start: &Cursor) -> Vec<Vec<u8>> {
        let mut found = Vec::new();
        trie.walk(start, |path, node| {
            if node.holds_token() {
                found.push(path.to_vec());
            }
            Ok(Visit::Descend)
        })
        .unwrap();
        found
    }

    #[test]
    fn test_find_exact_tokens() {
        let trie = trie_of(&["cat", "cats", "car", "dog"], false);

        for token in ["cat", "cats", "car", "dog"] {
            let nodes = trie.find_tokens(token.as_bytes(), false).unwrap();
            assert_eq!(nodes.len(), 1, "{}", token);
        }
        assert!(trie.find_tokens(b"ca", false).unwrap().is_empty());
        assert!(trie.find_tokens(b"cattle", false).unwrap().is_empty());
        assert!(trie.find_tokens(b"", false).unwrap().is_empty());
    }

    #[test]
    fn test_folded_descent_explores_case_variants() {
        let trie = trie_of(&["cat", "CAT", "Cab"], true);

        assert_eq!(trie.find_tokens(b"Cat", false).unwrap().len(), 0);
        let nodes = trie.find_tokens(b"Cat", true).unwrap();
        assert_eq!(nodes.len(), 2);

        let postings: Vec<Posting> = nodes
            .iter()
            .flat_map(|node| trie.postings_of(node).unwrap())
            .collect();
        let mut docs: Vec<u32> = postings.iter().map(|p| p.doc_id).collect();
        docs.sort();
        assert_eq!(docs, vec![0, 1]);
    }

    #[test]
    fn test_children_matching() {
        let node = NodeRecord {
            id: 0,
            label: Vec::new(),
            children: vec![
                ChildRef { id: 1, first: b'1' },
                ChildRef { id: 2, first: b'a' },
                ChildRef { id: 3, first: b'A' },
                ChildRef { id: 4, first: b'b' },
            ],
            posting_count: 0,
            posting_pointer: 0,
        };

        assert_eq!(Trie::children_matching(&node, b'A', false)[0].id, 3);
        let folded: Vec<NodeId> = Trie::children_matching(&node, b'A', true)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(folded, vec![2, 3]);
        assert_eq!(Trie::children_matching(&node, b'B', true)[0].id, 4);
        assert!(Trie::children_matching(&node, b'B', false).is_empty());
        assert!(Trie::children_matching(&node, b'z', true).is_empty());
    }

    #[test]
    fn test_walk_is_pre_order() {
        let trie = trie_of(&["b", "ab", "a", "abc", "ac"], false);
        let root = trie.root().unwrap();
        assert_eq!(
            tokens_below(&trie, &root),
            vec![
                b"a".to_vec(),
                b"ab".to_vec(),
                b"abc".to_vec(),
                b"ac".to_vec(),
                b"b".to_vec()
            ]
        );
    }

    #[test]
    fn test_walk_from_inside_a_label() {
        let trie = trie_of(&["carpet", "carpets", "cartoon"], false);
        let cursors = trie.follow(trie.root().unwrap(), b"carp", false).unwrap();
        assert_eq!(cursors.len(), 1);
        assert_eq!(
            tokens_below(&trie, &cursors[0]),
            vec![b"et".to_vec(), b"ets".to_vec()]
        );
    }

    #[test]
    fn test_step() {
        let trie = trie_of(&["ax", "by"], false);
        let steps = trie.step(&trie.root().unwrap()).unwrap();
        let firsts: Vec<u8> = steps.iter().map(|(b, _)| *b).collect();
        assert_eq!(firsts, vec![b'a', b'b']);

        let (_, cursor) = &steps[0];
        let inner = trie.step(cursor).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].0, b'x');
        assert!(inner[0].1.token_node().is_some());
    }

    #[test]
    fn test_cycle_is_reported_as_corruption() {
        // root -> node 1 "a" -> node 1 again
        let mut nodes = Vec::new();
        let mut offsets = vec![0u32];
        encode_node(b"", &[ChildRef { id: 1, first: b'a' }], 0, 0, &mut nodes).unwrap();
        offsets.push(nodes.len() as u32);
        encode_node(b"a", &[ChildRef { id: 1, first: b'a' }], 0, 0, &mut nodes).unwrap();
        offsets.push(nodes.len() as u32);
        let directory = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();

        let store = RecordStore::from_bytes(directory, nodes, Vec::new()).unwrap();
        let trie = Trie::new(store, PostingLayout::Grouped, false);
        let err = trie
            .walk(&trie.root().unwrap(), |_, _| Ok(Visit::Descend))
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_mismatched_child_byte_is_corruption() {
        let mut nodes = Vec::new();
        let mut offsets = vec![0u32];
        encode_node(b"", &[ChildRef { id: 1, first: b'q' }], 0, 0, &mut nodes).unwrap();
        offsets.push(nodes.len() as u32);
        encode_node(b"z", &[], 0, 0, &mut nodes).unwrap();
        offsets.push(nodes.len() as u32);
        let directory = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();

        let store = RecordStore::from_bytes(directory, nodes, Vec::new()).unwrap();
        let trie = Trie::new(store, PostingLayout::Grouped, false);
        assert!(trie.find_tokens(b"q", false).unwrap_err().is_corruption());
    }
}
