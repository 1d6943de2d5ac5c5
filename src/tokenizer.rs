use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Splits document text into word tokens with their positions
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn normalize(&self, word: &str) -> String {
        if self.config.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        }
    }

    fn keep(&self, token: &str) -> bool {
        token.len() >= self.config.min_token_length && token.len() <= self.config.max_token_length
    }

    /// Tokenize and return (token, position) pairs in order.
    ///
    /// Positions count every word, including ones dropped by the length
    /// filter, so they match word offsets in the source text.
    pub fn tokenize_with_positions_ordered(&self, text: &str) -> Vec<(String, u32)> {
        let mut results = Vec::new();

        for (pos, word) in text.unicode_words().enumerate() {
            let token = self.normalize(word);
            if self.keep(&token) {
                results.push((token, pos as u32));
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(tokenizer: &Tokenizer, text: &str) -> Vec<String> {
        tokenizer
            .tokenize_with_positions_ordered(text)
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::new(&TokenizerConfig::default());
        assert_eq!(
            tokens(&tokenizer, "Hello, World! 3.5 apples"),
            vec!["Hello", "World", "3.5", "apples"]
        );
    }

    #[test]
    fn test_lowercase_and_length_filter() {
        let config = TokenizerConfig {
            lowercase: true,
            min_token_length: 2,
            max_token_length: 5,
        };
        let tokenizer = Tokenizer::new(&config);
        assert_eq!(
            tokens(&tokenizer, "A Quick brown FOXES jumped"),
            vec!["quick", "brown", "foxes"]
        );
    }

    #[test]
    fn test_positions_skip_filtered_words() {
        let config = TokenizerConfig {
            min_token_length: 2,
            ..TokenizerConfig::default()
        };
        let tokenizer = Tokenizer::new(&config);
        assert_eq!(
            tokenizer.tokenize_with_positions_ordered("the a cat"),
            vec![("the".to_string(), 0), ("cat".to_string(), 2)]
        );
    }
}
