//! Posting list codec and iterators
//!
//! A posting list of `n` entries is `n` document-id deltas and `n` raw
//! positions, all vbyte-encoded. The first delta is relative to the list's
//! document base (0 for every list this crate writes). The index-wide
//! [`PostingLayout`] decides the order:
//!
//! ```text
//! grouped:     d1 d2 .. dn p1 p2 .. pn
//! interleaved: d1 p1 d2 p2 .. dn pn
//! ```

use super::codec::encode_vbyte;
use super::store::RegionCursor;
use super::types::{Posting, PostingLayout};
use crate::error::TextrieError;
use crate::Result;

/// Append `postings` (sorted by doc id, then position) to `output` and
/// return the offset the list starts at
pub fn encode_postings(postings: &[Posting], layout: PostingLayout, output: &mut Vec<u8>) -> u64 {
    let pointer = output.len() as u64;
    let mut last_doc = 0u32;

    match layout {
        PostingLayout::Grouped => {
            for posting in postings {
                encode_vbyte(posting.doc_id - last_doc, output);
                last_doc = posting.doc_id;
            }
            for posting in postings {
                encode_vbyte(posting.position, output);
            }
        }
        PostingLayout::Interleaved => {
            for posting in postings {
                encode_vbyte(posting.doc_id - last_doc, output);
                encode_vbyte(posting.position, output);
                last_doc = posting.doc_id;
            }
        }
    }

    pointer
}

fn advance_doc(doc: u32, delta: u32) -> Result<u32> {
    doc.checked_add(delta)
        .ok_or_else(|| TextrieError::corrupt("document id delta overflows u32"))
}

/// Decode a whole posting list of `count` entries
pub fn decode_postings(
    cursor: &mut RegionCursor<'_>,
    count: u32,
    layout: PostingLayout,
    doc_base: u32,
) -> Result<Vec<Posting>> {
    let n = count as usize;
    let mut postings = Vec::with_capacity(n);
    let mut doc = doc_base;

    match layout {
        PostingLayout::Grouped => {
            for _ in 0..n {
                doc = advance_doc(doc, cursor.read_vbyte()?)?;
                postings.push(Posting::new(doc, 0));
            }
            for posting in postings.iter_mut() {
                posting.position = cursor.read_vbyte()?;
            }
        }
        PostingLayout::Interleaved => {
            for _ in 0..n {
                doc = advance_doc(doc, cursor.read_vbyte()?)?;
                let position = cursor.read_vbyte()?;
                postings.push(Posting::new(doc, position));
            }
        }
    }

    Ok(postings)
}

/// Forward-only decoder over an interleaved posting list
pub struct InterleavedCursor<'a> {
    cursor: RegionCursor<'a>,
    remaining: u32,
    doc: u32,
    failed: bool,
}

impl<'a> InterleavedCursor<'a> {
    pub fn new(cursor: RegionCursor<'a>, count: u32, doc_base: u32) -> Self {
        Self {
            cursor,
            remaining: count,
            doc: doc_base,
            failed: false,
        }
    }

    fn read_one(&mut self) -> Result<Posting> {
        self.doc = advance_doc(self.doc, self.cursor.read_vbyte()?)?;
        let position = self.cursor.read_vbyte()?;
        Ok(Posting::new(self.doc, position))
    }
}

impl<'a> Iterator for InterleavedCursor<'a> {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.failed {
            return None;
        }
        self.remaining -= 1;

        let item = self.read_one();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

/// Postings produced by a lookup
///
/// The occurrence count is known before any entry is decoded. Lazily decoded
/// lists stop after the first error.
pub enum PostingIter<'a> {
    Empty,
    Materialized(std::vec::IntoIter<Posting>),
    Lazy(InterleavedCursor<'a>),
}

impl std::fmt::Debug for PostingIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostingIter::Empty => f.write_str("Empty"),
            PostingIter::Materialized(iter) => f.debug_tuple("Materialized").field(iter).finish(),
            PostingIter::Lazy(cursor) => f
                .debug_struct("Lazy")
                .field("remaining", &cursor.remaining)
                .finish(),
        }
    }
}

impl<'a> PostingIter<'a> {
    pub fn from_vec(postings: Vec<Posting>) -> Self {
        if postings.is_empty() {
            PostingIter::Empty
        } else {
            PostingIter::Materialized(postings.into_iter())
        }
    }

    /// Number of entries not yet yielded
    pub fn len(&self) -> usize {
        match self {
            PostingIter::Empty => 0,
            PostingIter::Materialized(iter) => iter.len(),
            PostingIter::Lazy(cursor) => cursor.remaining as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode everything that is left
    pub fn collect_postings(self) -> Result<Vec<Posting>> {
        match self {
            PostingIter::Empty => Ok(Vec::new()),
            PostingIter::Materialized(iter) => Ok(iter.collect()),
            PostingIter::Lazy(cursor) => cursor.collect(),
        }
    }

    /// Group consecutive entries by document
    pub fn by_document(self) -> DocGroups<'a> {
        DocGroups {
            inner: self,
            pending: None,
        }
    }
}

impl<'a> Iterator for PostingIter<'a> {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            PostingIter::Empty => None,
            PostingIter::Materialized(iter) => iter.next().map(Ok),
            PostingIter::Lazy(cursor) => cursor.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            PostingIter::Lazy(cursor) => (0, Some(cursor.remaining as usize)),
            other => (other.len(), Some(other.len())),
        }
    }
}

/// All positions of a token inside one document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocMatch {
    pub doc_id: u32,
    pub positions: Vec<u32>,
}

/// Iterator returned by [`PostingIter::by_document`]
pub struct DocGroups<'a> {
    inner: PostingIter<'a>,
    pending: Option<Posting>,
}

impl<'a> Iterator for DocGroups<'a> {
    type Item = Result<DocMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.pending.take() {
            Some(posting) => posting,
            None => match self.inner.next()? {
                Ok(posting) => posting,
                Err(e) => return Some(Err(e)),
            },
        };

        let mut group = DocMatch {
            doc_id: first.doc_id,
            positions: vec![first.position],
        };

        loop {
            match self.inner.next() {
                Some(Ok(posting)) if posting.doc_id == group.doc_id => {
                    group.positions.push(posting.position);
                }
                Some(Ok(posting)) => {
                    self.pending = Some(posting);
                    break;
                }
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }

        Some(Ok(group))
    }
}
