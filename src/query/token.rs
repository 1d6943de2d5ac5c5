//! Query token descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a token is matched against the index
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QueryMode {
    /// Exact token
    #[default]
    Literal,
    /// Token with one `.`, `.?`, `.*` or `.+` marker
    Wildcard,
    /// Tokens within an edit distance; `None` uses the configured default
    Fuzzy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_distance: Option<u32>,
    },
    /// Inclusive numeric or name-token range
    Range { low: String, high: String },
}

impl QueryMode {
    pub fn name(&self) -> &'static str {
        match self {
            QueryMode::Literal => "literal",
            QueryMode::Wildcard => "wildcard",
            QueryMode::Fuzzy { .. } => "fuzzy",
            QueryMode::Range { .. } => "range",
        }
    }
}

/// A single token lookup request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryToken {
    /// Token text; unused for ranges
    pub text: String,
    #[serde(flatten)]
    pub mode: QueryMode,
    /// Match case exactly; otherwise ASCII case is ignored
    #[serde(default)]
    pub case_sensitive: bool,
    /// Set when the token was produced by stemming; carried for callers
    #[serde(default)]
    pub stemmed: bool,
}

impl QueryToken {
    fn with_mode(text: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            text: text.into(),
            mode,
            case_sensitive: false,
            stemmed: false,
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::with_mode(text, QueryMode::Literal)
    }

    pub fn wildcard(pattern: impl Into<String>) -> Self {
        Self::with_mode(pattern, QueryMode::Wildcard)
    }

    pub fn fuzzy(text: impl Into<String>, max_distance: Option<u32>) -> Self {
        Self::with_mode(text, QueryMode::Fuzzy { max_distance })
    }

    pub fn range(low: impl Into<String>, high: impl Into<String>) -> Self {
        Self::with_mode(
            String::new(),
            QueryMode::Range {
                low: low.into(),
                high: high.into(),
            },
        )
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn stemmed(mut self, stemmed: bool) -> Self {
        self.stemmed = stemmed;
        self
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }
}

impl fmt::Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            QueryMode::Range { low, high } => write!(f, "range[{}, {}]", low, high)?,
            QueryMode::Fuzzy {
                max_distance: Some(d),
            } => write!(f, "fuzzy({}, {})", self.text, d)?,
            mode => write!(f, "{}({})", mode.name(), self.text)?,
        }
        if self.case_sensitive {
            write!(f, " cs")?;
        }
        Ok(())
    }
}
