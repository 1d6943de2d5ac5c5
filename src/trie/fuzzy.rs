//! Bounded edit-distance search over the trie
//!
//! Each visited trie byte extends one row of the Levenshtein table for the
//! query token. A subtree is abandoned once every cell of the row exceeds
//! the budget, since no extension can bring the distance back down.

use std::collections::BTreeMap;

use super::navigator::{Trie, MAX_DEPTH};
use super::types::{bytes_match, NodeId, NodeRecord};
use crate::error::TextrieError;
use crate::Result;

/// Default budget for a token of `len` bytes: one edit per four bytes, at
/// least one
pub fn default_distance(len: usize) -> u32 {
    std::cmp::max(1, (len / 4) as u32)
}

/// Token nodes within `max_distance` edits of `token`
pub fn fuzzy_nodes(trie: &Trie, token: &[u8], max_distance: u32, folded: bool) -> Result<Vec<NodeRecord>> {
    if token.is_empty() {
        return Ok(Vec::new());
    }

    let search = FuzzySearch {
        trie,
        token,
        max: max_distance as usize,
        folded,
    };
    let mut found = BTreeMap::new();
    let root = trie.root()?.node;
    let first_row: Vec<usize> = (0..=token.len()).collect();
    search.visit(&root, first_row, 0, &mut found)?;

    Ok(found.into_values().collect())
}

struct FuzzySearch<'t> {
    trie: &'t Trie,
    token: &'t [u8],
    max: usize,
    folded: bool,
}

impl<'t> FuzzySearch<'t> {
    /// Row for the path extended by `byte`
    fn next_row(&self, prev: &[usize], byte: u8) -> Vec<usize> {
        let mut row = Vec::with_capacity(prev.len());
        row.push(prev[0] + 1);

        for j in 1..prev.len() {
            let cost = if bytes_match(self.token[j - 1], byte, self.folded) {
                0
            } else {
                1
            };
            let value = std::cmp::min(
                std::cmp::min(
                    prev[j] + 1,    // extra byte in the trie path
                    row[j - 1] + 1, // byte missing from the trie path
                ),
                prev[j - 1] + cost, // match or substitution
            );
            row.push(value);
        }
        row
    }

    fn visit(
        &self,
        node: &NodeRecord,
        mut row: Vec<usize>,
        depth: usize,
        found: &mut BTreeMap<NodeId, NodeRecord>,
    ) -> Result<()> {
        for &byte in &node.label {
            row = self.next_row(&row, byte);
            if row.iter().all(|&d| d > self.max) {
                return Ok(());
            }
        }

        if node.holds_token() && row[self.token.len()] <= self.max {
            found.entry(node.id).or_insert_with(|| node.clone());
        }

        if node.is_inner() && depth >= MAX_DEPTH {
            return Err(TextrieError::corrupt(format!(
                "trie deeper than {} nodes at node {}",
                MAX_DEPTH, node.id
            )));
        }
        for child in &node.children {
            let child_node = self.trie.node(child.id)?;
            self.visit(&child_node, row.clone(), depth + 1, found)?;
        }
        Ok(())
    }
}

/// Levenshtein distance between two byte strings
pub fn levenshtein_distance(s1: &[u8], s2: &[u8]) -> usize {
    let (shorter, longer) = if s1.len() <= s2.len() { (s1, s2) } else { (s2, s1) };
    if shorter.is_empty() {
        return longer.len();
    }

    let mut prev_row: Vec<usize> = (0..=shorter.len()).collect();
    let mut curr_row = vec![0; shorter.len() + 1];

    for i in 1..=longer.len() {
        curr_row[0] = i;
        for j in 1..=shorter.len() {
            let cost = if longer[i - 1] == shorter[j - 1] { 0 } else { 1 };
            curr_row[j] = std::cmp::min(
                std::cmp::min(prev_row[j] + 1, curr_row[j - 1] + 1),
                prev_row[j - 1] + cost,
            );
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[shorter.len()]
}
