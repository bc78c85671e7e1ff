//! Query and passage text normalization for lexical search.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::{TokenizerConfig, TokenizerKind};
use crate::error::{Result, ShaikhError};

/// Turns raw text into the normalized form the keyword index expects.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, raw: &str) -> String;
}

/// Arabic preprocessing: strips tashkeel and tatweel, keeps Arabic letters,
/// digits and whitespace, then drops stopwords.
#[derive(Debug, Clone, Default)]
pub struct ArabicNormalizer {
    stopwords: HashSet<String>,
}

impl ArabicNormalizer {
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self { stopwords }
    }

    fn is_diacritic(c: char) -> bool {
        matches!(c, '\u{064B}'..='\u{0655}' | '\u{0670}' | '\u{0640}')
    }

    fn is_arabic_letter(c: char) -> bool {
        matches!(c, '\u{0621}'..='\u{064A}' | '\u{0671}')
    }

    fn clean(raw: &str) -> String {
        raw.chars()
            .filter(|&c| !Self::is_diacritic(c))
            .filter(|&c| Self::is_arabic_letter(c) || c.is_numeric() || c.is_whitespace())
            .collect()
    }
}

impl Tokenizer for ArabicNormalizer {
    fn tokenize(&self, raw: &str) -> String {
        Self::clean(raw)
            .split_whitespace()
            .filter(|word| !self.stopwords.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Lowercases and keeps alphanumeric words.
#[derive(Debug, Clone, Default)]
pub struct PlainTokenizer {
    stopwords: HashSet<String>,
}

impl PlainTokenizer {
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self { stopwords }
    }
}

impl Tokenizer for PlainTokenizer {
    fn tokenize(&self, raw: &str) -> String {
        let cleaned: String = raw
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .to_lowercase();

        cleaned
            .split_whitespace()
            .filter(|word| !self.stopwords.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Reads stopwords from a JSON object; its keys are the stopwords.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ShaikhError::Io {
        source: e,
        context: format!("Failed to read stopwords file: {}", path.display()),
    })?;
    parse_stopwords(&content).map_err(|e| ShaikhError::Json {
        source: e,
        context: format!("Failed to parse stopwords file: {}", path.display()),
    })
}

fn parse_stopwords(content: &str) -> std::result::Result<HashSet<String>, serde_json::Error> {
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
    Ok(raw.into_iter().map(|(word, _)| word).collect())
}

/// Builds the configured tokenizer.
pub fn from_config(config: &TokenizerConfig) -> Result<Arc<dyn Tokenizer>> {
    let stopwords = match &config.stopwords_file {
        Some(path) => load_stopwords(path)?,
        None => HashSet::new(),
    };

    Ok(match config.kind {
        TokenizerKind::Arabic => Arc::new(ArabicNormalizer::new(stopwords)),
        TokenizerKind::Plain => Arc::new(PlainTokenizer::new(stopwords)),
    })
}
