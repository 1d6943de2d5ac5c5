use dashmap::DashMap;

/// Result of one literal descent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedToken {
    /// 0 when the token is absent
    pub count: u32,
    pub pointer: u64,
    pub doc_base: u32,
}

impl CachedToken {
    pub const MISSING: CachedToken = CachedToken {
        count: 0,
        pointer: 0,
        doc_base: 0,
    };

    pub fn is_missing(&self) -> bool {
        self.count == 0
    }
}

/// Token -> (count, pointer, doc base) memo for literal lookups.
///
/// Entries live as long as the index; nothing is evicted. Concurrent inserts
/// of the same key write identical values, so the last writer wins.
#[derive(Default)]
pub struct TokenCache {
    entries: DashMap<Vec<u8>, CachedToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<CachedToken> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    pub fn insert(&self, key: Vec<u8>, entry: CachedToken) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
