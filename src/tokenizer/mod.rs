//! Tokenizer trait and the default word/punctuation tokenizer.
//!
//! The default rule: lower-case, split every character that is neither a word
//! character (`[A-Za-z0-9_]`) nor whitespace into its own token, split on
//! whitespace, drop empties. Order is preserved.
//!
//! [`NormalizingTokenizer`] applies NFC first, so composed and decomposed
//! text tokenize identically. It is opt-in through
//! [`TokenPipeline::set_tokenizer`](crate::engine::TokenPipeline::set_tokenizer).

use unicode_normalization::UnicodeNormalization;

/// Converts raw input text into an ordered token sequence.
///
/// All implementations must be thread-safe (`Send + Sync`).
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// The default tokenizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordTokenizer;

impl WordTokenizer {
    pub fn new() -> Self {
        Self
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Whitespace as split on by the tokenizer: Unicode white space plus the
/// byte-order mark, excluding NEL (U+0085).
fn is_separator(ch: char) -> bool {
    ch == '\u{FEFF}' || (ch.is_whitespace() && ch != '\u{85}')
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();

        let mut tokens = Vec::new();
        let mut current = String::new();
        for ch in lowered.chars() {
            if is_separator(ch) {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            } else if is_word_char(ch) {
                current.push(ch);
            } else {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }
}

/// NFC-normalizes input, then applies the [`WordTokenizer`] rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizingTokenizer;

impl Tokenizer for NormalizingTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text.nfc().collect();
        WordTokenizer.tokenize(&normalized)
    }
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn tokenize(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Tokenize with the default rule.
pub fn tokenize(text: &str) -> Vec<String> {
    WordTokenizer.tokenize(text)
}
