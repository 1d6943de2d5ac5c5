//! On-disk compressed trie: storage, codecs, and the query engines that walk it

pub mod algebra;
pub mod cache;
pub mod codec;
pub mod fuzzy;
pub mod navigator;
pub mod postings;
pub mod range;
pub mod store;
pub mod types;
pub mod wildcard;
pub mod writer;

pub use algebra::{distinct_ids, union, union_all};
pub use cache::{CachedToken, TokenCache};
pub use navigator::{Cursor, Trie, Visit, MAX_DEPTH};
pub use postings::{DocGroups, DocMatch, PostingIter};
pub use range::{Decimal, RangeBounds};
pub use store::RecordStore;
pub use types::{ChildRef, NodeId, NodeRecord, Posting, PostingLayout};
pub use wildcard::WildcardPattern;
pub use writer::{IndexImage, TrieBuilder};
