pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod query;
pub mod tokenizer;
pub mod trie;

pub use config::{BuildSettings, IndexMeta, SearchSettings, TokenizerConfig};
pub use error::{Result, TextrieError};
pub use index::{CaseVerifier, FtIndex, IndexInfo, TokenStat};
pub use metrics::IndexMetrics;
pub use query::{QueryMode, QueryToken};
pub use tokenizer::Tokenizer;
pub use trie::{DocMatch, IndexImage, Posting, PostingIter, PostingLayout, TrieBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
