//! The full-text index: opens a built trie and answers token queries

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use roaring::RoaringBitmap;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{IndexMeta, SearchSettings};
use crate::error::TextrieError;
use crate::metrics::IndexMetrics;
use crate::query::{QueryMode, QueryToken};
use crate::trie::cache::{CachedToken, TokenCache};
use crate::trie::fuzzy::fuzzy_nodes;
use crate::trie::range::range_nodes;
use crate::trie::store::META_FILE;
use crate::trie::wildcard::wildcard_nodes;
use crate::trie::{
    distinct_ids, IndexImage, NodeRecord, Posting, PostingIter, PostingLayout, RangeBounds,
    RecordStore, Trie, Visit, WildcardPattern,
};
use crate::Result;

/// Checks a candidate occurrence against the stored document text.
///
/// Case-folded indexes cannot tell `Cat` from `cat`; a case-sensitive query
/// against one asks the surrounding store to confirm each hit.
pub trait CaseVerifier: Send + Sync {
    /// Whether the word at `posting` is exactly `token`
    fn verify(&self, posting: &Posting, token: &str) -> bool;
}

impl<F> CaseVerifier for F
where
    F: Fn(&Posting, &str) -> bool + Send + Sync,
{
    fn verify(&self, posting: &Posting, token: &str) -> bool {
        self(posting, token)
    }
}

/// Posting count of one token, for statistics
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenStat {
    pub token: String,
    pub count: u32,
}

/// Index statistics
#[derive(Clone, Debug, Serialize)]
pub struct IndexInfo {
    pub node_count: u32,
    pub token_count: u32,
    pub occurrences: u64,
    pub disk_size: u64,
    pub case_sensitive: bool,
    pub layout: PostingLayout,
    /// Tokens with the most occurrences, largest first
    pub largest: Vec<TokenStat>,
    /// Tokens with the fewest occurrences, smallest first
    pub smallest: Vec<TokenStat>,
}

impl fmt::Display for IndexInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Full-text index")?;
        writeln!(f, "  nodes:          {}", self.node_count)?;
        writeln!(f, "  tokens:         {}", self.token_count)?;
        writeln!(f, "  occurrences:    {}", self.occurrences)?;
        writeln!(f, "  size:           {} bytes", self.disk_size)?;
        writeln!(f, "  case sensitive: {}", self.case_sensitive)?;
        writeln!(f, "  layout:         {}", self.layout)?;
        if !self.largest.is_empty() {
            writeln!(f, "  largest:")?;
            for stat in &self.largest {
                writeln!(f, "    {} ({})", stat.token, stat.count)?;
            }
            writeln!(f, "  smallest:")?;
            for stat in &self.smallest {
                writeln!(f, "    {} ({})", stat.token, stat.count)?;
            }
        }
        Ok(())
    }
}

/// Read-only full-text index over a built trie
pub struct FtIndex {
    trie: Trie,
    meta: IndexMeta,
    settings: SearchSettings,
    cache: TokenCache,
    metrics: IndexMetrics,
    verifier: Option<Arc<dyn CaseVerifier>>,
}

impl FtIndex {
    /// Open the index files in `dir`
    pub fn open<P: AsRef<Path>>(dir: P, settings: SearchSettings) -> Result<Self> {
        let dir = dir.as_ref();
        let meta = IndexMeta::decode(&fs::read(dir.join(META_FILE))?)?;
        let store = RecordStore::open(dir)?;
        Self::with_store(store, meta, settings)
    }

    /// Open a freshly built image without touching disk
    pub fn from_image(image: &IndexImage, settings: SearchSettings) -> Result<Self> {
        let store = RecordStore::from_image(image)?;
        Self::with_store(store, image.meta.clone(), settings)
    }

    fn with_store(store: RecordStore, meta: IndexMeta, settings: SearchSettings) -> Result<Self> {
        if store.node_count() != meta.node_count {
            return Err(TextrieError::corrupt(format!(
                "directory holds {} nodes, metadata expects {}",
                store.node_count(),
                meta.node_count
            )));
        }

        let metrics = IndexMetrics::new()?;
        metrics.set_index_shape(store.disk_size(), meta.token_count);
        info!(
            "Opened full-text index: {} tokens, case_sensitive={}, layout={}",
            meta.token_count, meta.case_sensitive, meta.layout
        );

        Ok(Self {
            trie: Trie::new(store, meta.layout, meta.case_sensitive),
            meta,
            settings,
            cache: TokenCache::new(),
            metrics,
            verifier: None,
        })
    }

    /// Install the verifier used for case-sensitive queries on a
    /// case-folded index
    pub fn with_verifier(mut self, verifier: Arc<dyn CaseVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &IndexMetrics {
        &self.metrics
    }

    /// Number of memoized literal descents
    pub fn cached_tokens(&self) -> usize {
        self.cache.len()
    }

    /// Token bytes as stored: ASCII-folded when the index was built that way
    fn normalize(&self, text: &str) -> Vec<u8> {
        if self.meta.case_sensitive {
            text.as_bytes().to_vec()
        } else {
            text.as_bytes().to_ascii_lowercase()
        }
    }

    /// Case-insensitive descent is only needed inside a case-sensitive tree
    fn folded(&self, query: &QueryToken) -> bool {
        self.meta.case_sensitive && !query.case_sensitive
    }

    fn verifier_for(&self, query: &QueryToken) -> Option<&Arc<dyn CaseVerifier>> {
        if !self.meta.case_sensitive && query.case_sensitive && self.settings.verify_case {
            self.verifier.as_ref()
        } else {
            None
        }
    }

    /// Resolve `query` to its postings, sorted by document then position
    pub fn lookup(&self, query: &QueryToken) -> Result<PostingIter<'_>> {
        let mode = query.mode_name();
        let start = Instant::now();

        match self.resolve(query) {
            Ok((postings, tokens)) => {
                self.metrics
                    .record_lookup(mode, start.elapsed().as_secs_f64(), tokens);
                Ok(postings)
            }
            Err(e) => {
                self.metrics.record_error(mode, e.is_corruption());
                Err(e)
            }
        }
    }

    fn resolve(&self, query: &QueryToken) -> Result<(PostingIter<'_>, usize)> {
        debug!("Resolving {}", query);
        let folded = self.folded(query);

        match &query.mode {
            QueryMode::Literal => {
                let found = self.literal(&self.normalize(&query.text), folded)?;
                self.verified(query, found)
            }
            QueryMode::Wildcard => {
                let token = self.normalize(&query.text);
                match WildcardPattern::parse(&token) {
                    Some(pattern) => self.from_nodes(wildcard_nodes(&self.trie, &pattern, folded)?),
                    None => {
                        let found = self.literal(&token, folded)?;
                        self.verified(query, found)
                    }
                }
            }
            QueryMode::Fuzzy { max_distance } => {
                let token = self.normalize(&query.text);
                let distance = match max_distance {
                    Some(d) => *d,
                    None => self.settings.fuzzy_distance_for(token.len()),
                };
                debug!("Fuzzy search for {:?} within {}", query.text, distance);
                self.from_nodes(fuzzy_nodes(&self.trie, &token, distance, folded)?)
            }
            QueryMode::Range { low, high } => {
                let bounds = RangeBounds::classify(&self.normalize(low), &self.normalize(high))?;
                self.from_nodes(range_nodes(&self.trie, &bounds, folded)?)
            }
        }
    }

    /// Keep only the occurrences the case verifier confirms; literal
    /// lookups only, since patterns have no single word to compare against
    fn verified<'a>(
        &self,
        query: &QueryToken,
        found: (PostingIter<'a>, usize),
    ) -> Result<(PostingIter<'a>, usize)> {
        let Some(verifier) = self.verifier_for(query) else {
            return Ok(found);
        };

        let (postings, tokens) = found;
        let candidates = postings.collect_postings()?;
        let before = candidates.len();
        let verified: Vec<Posting> = candidates
            .into_iter()
            .filter(|p| verifier.verify(p, &query.text))
            .collect();
        debug!(
            "Case verification kept {} of {} occurrences",
            verified.len(),
            before
        );
        Ok((PostingIter::from_vec(verified), tokens))
    }

    fn from_nodes(&self, nodes: Vec<NodeRecord>) -> Result<(PostingIter<'_>, usize)> {
        let tokens = nodes.len();
        Ok((PostingIter::from_vec(self.trie.union_postings(&nodes)?), tokens))
    }

    fn literal(&self, token: &[u8], folded: bool) -> Result<(PostingIter<'_>, usize)> {
        if folded {
            return self.from_nodes(self.trie.find_tokens(token, true)?);
        }

        let entry = self.literal_entry(token)?;
        let tokens = usize::from(!entry.is_missing());
        let postings = self
            .trie
            .iter_postings_at(entry.pointer, entry.count, entry.doc_base)?;
        Ok((postings, tokens))
    }

    /// Exact descent for `token`, memoized when the cache is enabled
    fn literal_entry(&self, token: &[u8]) -> Result<CachedToken> {
        if self.settings.cache_tokens {
            let hit = self.cache.get(token);
            self.metrics.record_cache(hit.is_some());
            if let Some(entry) = hit {
                return Ok(entry);
            }
        }

        let entry = match self.trie.find_tokens(token, false)?.first() {
            Some(node) => CachedToken {
                count: node.posting_count,
                pointer: node.posting_pointer,
                doc_base: 0,
            },
            None => CachedToken::MISSING,
        };

        if self.settings.cache_tokens {
            debug!(
                "Caching {:?} -> {} occurrences",
                String::from_utf8_lossy(token),
                entry.count
            );
            self.cache.insert(token.to_vec(), entry);
        }
        Ok(entry)
    }

    /// Number of occurrences matched by `query`.
    ///
    /// Exact literal lookups are answered from the node record without
    /// decoding postings.
    pub fn count(&self, query: &QueryToken) -> Result<usize> {
        if query.mode == QueryMode::Literal
            && !self.folded(query)
            && self.verifier_for(query).is_none()
        {
            let entry = self.literal_entry(&self.normalize(&query.text))?;
            return Ok(entry.count as usize);
        }
        Ok(self.lookup(query)?.len())
    }

    /// Distinct documents matched by `query`
    pub fn matching_docs(&self, query: &QueryToken) -> Result<RoaringBitmap> {
        let postings = self.lookup(query)?.collect_postings()?;
        Ok(distinct_ids(&postings).into_iter().collect())
    }

    /// Every stored token with its occurrence count, in tree order
    pub fn tokens(&self) -> Result<Vec<(Vec<u8>, u32)>> {
        let mut tokens = Vec::with_capacity(self.meta.token_count as usize);
        self.trie.walk(&self.trie.root()?, |path, node| {
            if node.holds_token() {
                tokens.push((path.to_vec(), node.posting_count));
            }
            Ok(Visit::Descend)
        })?;
        Ok(tokens)
    }

    /// Statistics, including the `top_n` largest and smallest tokens
    pub fn info(&self, top_n: usize) -> Result<IndexInfo> {
        let tokens = self.tokens()?;
        let occurrences = tokens.iter().map(|(_, count)| *count as u64).sum();

        let stats: Vec<TokenStat> = tokens
            .into_iter()
            .map(|(token, count)| TokenStat {
                token: String::from_utf8_lossy(&token).into_owned(),
                count,
            })
            .collect();

        // stable sorts keep tree order among equal counts
        let mut largest = stats.clone();
        largest.sort_by(|a, b| b.count.cmp(&a.count));
        largest.truncate(top_n);
        let mut smallest = stats;
        smallest.sort_by_key(|stat| stat.count);
        smallest.truncate(top_n);

        Ok(IndexInfo {
            node_count: self.meta.node_count,
            token_count: self.meta.token_count,
            occurrences,
            disk_size: self.trie.store().disk_size(),
            case_sensitive: self.meta.case_sensitive,
            layout: self.meta.layout,
            largest,
            smallest,
        })
    }

    /// Release the index files; later lookups fail with a storage error
    pub fn close(&self) {
        self.trie.store().close();
        self.cache.clear();
        info!("Closed full-text index");
    }

    pub fn is_closed(&self) -> bool {
        self.trie.store().is_closed()
    }
}
