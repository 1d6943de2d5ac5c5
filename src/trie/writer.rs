//! Index image writer
//!
//! Accumulates token occurrences and serializes them as a radix-compressed
//! trie:
//! - nodes are numbered breadth-first, the root is 0
//! - children are stored in tree order (see [`order_key`])
//! - labels longer than [`MAX_LABEL_LEN`] are split into node chains
//! - posting lists are written in node id order, before the records that
//!   point at them

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;

use tracing::info;

use super::codec::encode_node;
use super::navigator::MAX_DEPTH;
use super::postings::encode_postings;
use super::store::{DIRECTORY_FILE, META_FILE, NODES_FILE, POSTINGS_FILE};
use super::types::{fold, order_key, tree_cmp, ChildRef, NodeId, Posting, MAX_LABEL_LEN};
use crate::config::{BuildSettings, IndexMeta, FORMAT_VERSION};
use crate::error::TextrieError;
use crate::tokenizer::Tokenizer;
use crate::Result;

/// Longest token accepted by the builder
pub const MAX_TOKEN_LEN: usize = MAX_DEPTH;

/// Serialized regions and metadata of a complete index
#[derive(Clone, Debug)]
pub struct IndexImage {
    pub meta: IndexMeta,
    pub directory: Vec<u8>,
    pub nodes: Vec<u8>,
    pub postings: Vec<u8>,
}

impl IndexImage {
    /// Persist the image as the four index files inside `dir`
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        fs::write(dir.join(POSTINGS_FILE), &self.postings)?;
        fs::write(dir.join(NODES_FILE), &self.nodes)?;
        fs::write(dir.join(DIRECTORY_FILE), &self.directory)?;
        fs::write(dir.join(META_FILE), self.meta.encode()?)?;

        info!(
            "Wrote index to {:?}: {} nodes, {} tokens, {} bytes",
            dir,
            self.meta.node_count,
            self.meta.token_count,
            self.disk_size()
        );
        Ok(())
    }

    pub fn disk_size(&self) -> u64 {
        (self.directory.len() + self.nodes.len() + self.postings.len()) as u64
    }
}

struct BuildNode<'a> {
    label: Vec<u8>,
    children: Vec<usize>,
    postings: &'a [Posting],
}

/// Collects (token, document, position) occurrences into an [`IndexImage`]
pub struct TrieBuilder {
    settings: BuildSettings,
    tokens: BTreeMap<Vec<u8>, Vec<Posting>>,
}

impl TrieBuilder {
    pub fn new(settings: BuildSettings) -> Self {
        Self {
            settings,
            tokens: BTreeMap::new(),
        }
    }

    /// Record one occurrence; tokens are ASCII-folded for case-insensitive
    /// indexes
    pub fn add(&mut self, token: &[u8], doc_id: u32, position: u32) -> Result<()> {
        if token.is_empty() {
            return Err(TextrieError::InvalidRequest("empty token".to_string()));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(TextrieError::InvalidRequest(format!(
                "token of {} bytes exceeds {}",
                token.len(),
                MAX_TOKEN_LEN
            )));
        }

        let key = if self.settings.case_sensitive {
            token.to_vec()
        } else {
            token.iter().map(|b| fold(*b)).collect()
        };
        self.tokens
            .entry(key)
            .or_default()
            .push(Posting::new(doc_id, position));
        Ok(())
    }

    /// Tokenize `text` and record each token at its word position
    pub fn add_text(&mut self, doc_id: u32, text: &str, tokenizer: &Tokenizer) -> Result<usize> {
        let tokens = tokenizer.tokenize_with_positions_ordered(text);
        for (token, position) in &tokens {
            self.add(token.as_bytes(), doc_id, *position)?;
        }
        Ok(tokens.len())
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn build(mut self) -> Result<IndexImage> {
        for postings in self.tokens.values_mut() {
            postings.sort();
            postings.dedup();
        }

        let mut entries: Vec<(&[u8], &[Posting])> = self
            .tokens
            .iter()
            .map(|(token, postings)| (token.as_slice(), postings.as_slice()))
            .collect();
        entries.sort_by(|a, b| tree_cmp(a.0, b.0));

        let mut arena = vec![BuildNode {
            label: Vec::new(),
            children: Vec::new(),
            postings: &[],
        }];
        let root_children = build_children(&mut arena, &entries)?;
        arena[0].children = root_children;

        // breadth-first numbering
        let mut ids: Vec<NodeId> = vec![0; arena.len()];
        let mut order: Vec<usize> = Vec::with_capacity(arena.len());
        let mut queue = VecDeque::from([0usize]);
        while let Some(idx) = queue.pop_front() {
            ids[idx] = u32::try_from(order.len())
                .map_err(|_| TextrieError::InvalidRequest("more than u32::MAX trie nodes".to_string()))?;
            order.push(idx);
            queue.extend(arena[idx].children.iter().copied());
        }

        let layout = self.settings.layout;
        let mut postings = Vec::new();
        let mut pointers: Vec<u64> = vec![0; arena.len()];
        for &idx in &order {
            if !arena[idx].postings.is_empty() {
                pointers[idx] = encode_postings(arena[idx].postings, layout, &mut postings);
            }
        }

        let mut nodes = Vec::new();
        let mut directory = Vec::with_capacity((order.len() + 1) * 4);
        for &idx in &order {
            directory.extend_from_slice(&region_offset(nodes.len())?.to_le_bytes());

            let node = &arena[idx];
            let children: Vec<ChildRef> = node
                .children
                .iter()
                .map(|&c| ChildRef {
                    id: ids[c],
                    first: arena[c].label[0],
                })
                .collect();
            let count = u32::try_from(node.postings.len()).map_err(|_| {
                TextrieError::InvalidRequest("posting list longer than u32::MAX".to_string())
            })?;
            encode_node(&node.label, &children, count, pointers[idx], &mut nodes)?;
        }
        directory.extend_from_slice(&region_offset(nodes.len())?.to_le_bytes());

        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            node_count: order.len() as u32,
            token_count: entries.len() as u32,
            case_sensitive: self.settings.case_sensitive,
            layout,
        };

        Ok(IndexImage {
            meta,
            directory,
            nodes,
            postings,
        })
    }
}

fn region_offset(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| TextrieError::InvalidRequest("node region exceeds 4 GiB".to_string()))
}

/// Build the children for `entries`, all non-empty suffixes in tree order.
/// Returns their arena indices in the same order.
fn build_children<'a>(
    arena: &mut Vec<BuildNode<'a>>,
    entries: &[(&'a [u8], &'a [Posting])],
) -> Result<Vec<usize>> {
    let mut children = Vec::new();
    let mut start = 0;

    while start < entries.len() {
        let first = entries[start].0[0];
        let end = start
            + entries[start..]
                .iter()
                .take_while(|(suffix, _)| suffix[0] == first)
                .count();
        let group = &entries[start..end];

        let mut common = group[0].0.len();
        for (suffix, _) in &group[1..] {
            common = common.min(
                group[0]
                    .0
                    .iter()
                    .zip(suffix.iter())
                    .take_while(|(a, b)| a == b)
                    .count(),
            );
        }
        let label_len = common.min(MAX_LABEL_LEN);

        let mut holder: &[Posting] = &[];
        let mut rest = Vec::with_capacity(group.len());
        for &(suffix, postings) in group {
            if suffix.len() == label_len {
                holder = postings;
            } else {
                rest.push((&suffix[label_len..], postings));
            }
        }

        let idx = arena.len();
        arena.push(BuildNode {
            label: group[0].0[..label_len].to_vec(),
            children: Vec::new(),
            postings: holder,
        });
        let grandchildren = build_children(arena, &rest)?;
        arena[idx].children = grandchildren;
        children.push(idx);

        start = end;
    }

    debug_assert!(children
        .windows(2)
        .all(|w| order_key(arena[w[0]].label[0]) < order_key(arena[w[1]].label[0])));
    Ok(children)
}
