use serde::{Deserialize, Serialize};

use crate::error::TextrieError;
use crate::trie::fuzzy::default_distance;
use crate::trie::PostingLayout;
use crate::Result;

/// Version of the on-disk format written by this crate
pub const FORMAT_VERSION: u32 = 1;

/// Metadata persisted next to the three index regions.
///
/// Written once at build time and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    /// Number of trie nodes (the directory holds `node_count + 1` offsets)
    pub node_count: u32,
    /// Number of distinct tokens (nodes with a posting list)
    pub token_count: u32,
    /// Whether tokens were indexed with their original case
    pub case_sensitive: bool,
    pub layout: PostingLayout,
}

impl IndexMeta {
    /// Serialize as `bincode(meta) || crc32(le)`
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = bincode::serialize(self)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&bytes);
        let crc = hasher.finalize();
        bytes.extend_from_slice(&crc.to_le_bytes());
        Ok(bytes)
    }

    /// Decode and checksum-verify metadata bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(TextrieError::corrupt("metadata shorter than its checksum"));
        }
        let (payload, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let mut stored = [0u8; 4];
        stored.copy_from_slice(crc_bytes);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != u32::from_le_bytes(stored) {
            return Err(TextrieError::corrupt("metadata checksum mismatch"));
        }

        let meta: IndexMeta = bincode::deserialize(payload)?;
        if meta.format_version > FORMAT_VERSION {
            return Err(TextrieError::corrupt(format!(
                "unsupported format version {}, expected <= {}",
                meta.format_version, FORMAT_VERSION
            )));
        }
        Ok(meta)
    }
}

/// Build-time settings, persisted into [`IndexMeta`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildSettings {
    pub case_sensitive: bool,
    pub layout: PostingLayout,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            layout: PostingLayout::Grouped,
        }
    }
}

impl BuildSettings {
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_layout(mut self, layout: PostingLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Query-time settings supplied by the surrounding store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Default fuzzy edit distance, 0 picks `max(1, len / 4)`
    pub fuzzy_distance: u32,
    /// Run the installed case verifier for case-sensitive queries on a
    /// case-folded index
    pub verify_case: bool,
    /// Memoize literal token descents
    pub cache_tokens: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            fuzzy_distance: 0,
            verify_case: true,
            cache_tokens: true,
        }
    }
}

impl SearchSettings {
    pub fn with_fuzzy_distance(mut self, distance: u32) -> Self {
        self.fuzzy_distance = distance;
        self
    }

    pub fn with_verify_case(mut self, verify: bool) -> Self {
        self.verify_case = verify;
        self
    }

    pub fn with_cache_tokens(mut self, cache: bool) -> Self {
        self.cache_tokens = cache;
        self
    }

    /// Edit distance to use for a token of `token_len` bytes
    pub fn fuzzy_distance_for(&self, token_len: usize) -> u32 {
        if self.fuzzy_distance > 0 {
            self.fuzzy_distance
        } else {
            default_distance(token_len)
        }
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: false,
            min_token_length: 1,
            max_token_length: 64,
        }
    }
}
