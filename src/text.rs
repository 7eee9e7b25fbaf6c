use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::document::Document;
use crate::error::ConfigError;
use crate::features::ratio;

const BUNDLED_WORDS: &str = include_str!("../assets/words.txt");
const HIDDEN_PARENTS: [&str; 5] = ["style", "script", "head", "title", "meta"];
const INFLECTION_DEPTH: usize = 2;

// (suffix, replacement) pairs tried before the verb and adverb endings.
const REWRITES: [(&str, &str); 20] = [
    ("'s", ""),
    ("\u{2019}s", ""),
    ("ies", "y"),
    ("ied", "y"),
    ("ier", "y"),
    ("iest", "y"),
    ("ily", "y"),
    ("iness", "y"),
    ("es", ""),
    ("ness", ""),
    ("ment", ""),
    ("ful", ""),
    ("less", ""),
    ("men", "man"),
    ("ication", "y"),
    ("ation", "ate"),
    ("ation", "e"),
    ("ation", ""),
    ("ability", "able"),
    ("able", ""),
];
const VERB_SUFFIXES: [&str; 4] = ["ed", "ing", "er", "est"];
const PREFIXES: [&str; 9] = ["re", "un", "dis", "mis", "non", "pre", "over", "under", "out"];
const MIN_PREFIXED_STEM: usize = 5;

pub fn visible_text(doc: &Document) -> String {
    let mut pieces = Vec::new();
    for node in doc.text_nodes() {
        let Some(parent) = node.parent else {
            continue;
        };
        if HIDDEN_PARENTS.contains(&parent) {
            continue;
        }
        let text = node.text.trim();
        if !text.is_empty() {
            pieces.push(text);
        }
    }
    pieces.join(" ")
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    pub fn bundled() -> Self {
        Self::from_lines(BUNDLED_WORDS)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_lines(&text))
    }

    fn from_lines(text: &str) -> Self {
        let words = text
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|word| !word.is_empty() && !word.starts_with('#'))
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// `word` must already be normalized by [`normalize_token`]. Inflected
    /// forms are accepted when up to two affix rewrites reach a listed word.
    pub fn knows(&self, word: &str) -> bool {
        if word.chars().any(|c| c.is_ascii_digit()) && word.chars().all(|c| !c.is_alphabetic()) {
            return true;
        }
        self.knows_inflected(word, INFLECTION_DEPTH)
    }

    fn knows_inflected(&self, word: &str, depth: usize) -> bool {
        if self.words.contains(word) {
            return true;
        }
        if word.contains('-') {
            let parts = word.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>();
            return !parts.is_empty() && parts.iter().all(|part| self.knows_inflected(part, depth));
        }
        depth > 0 && stems(word).iter().any(|stem| self.knows_inflected(stem, depth - 1))
    }
}

fn stems(word: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for (suffix, replacement) in REWRITES {
        if let Some(stem) = word.strip_suffix(suffix) {
            candidates.push(format!("{stem}{replacement}"));
        }
    }
    if let Some(stem) = word.strip_suffix('s').filter(|_| !word.ends_with("ss")) {
        candidates.push(stem.to_string());
    }
    for suffix in VERB_SUFFIXES {
        if let Some(stem) = word.strip_suffix(suffix) {
            candidates.push(stem.to_string());
            candidates.push(format!("{stem}e"));
            if let Some(single) = undouble(stem) {
                candidates.push(single);
            }
        }
    }
    if let Some(stem) = word.strip_suffix("ly") {
        candidates.push(stem.to_string());
        candidates.push(format!("{stem}le"));
    }
    // "repaint" but not "untill"
    for prefix in PREFIXES {
        if let Some(rest) = word
            .strip_prefix(prefix)
            .filter(|rest| rest.chars().count() >= MIN_PREFIXED_STEM)
        {
            candidates.push(rest.to_string());
        }
    }
    candidates.retain(|stem| stem.chars().count() >= 2);
    candidates
}

// "stopp" -> "stop", "travell" -> "travel"
fn undouble(stem: &str) -> Option<String> {
    let mut tail = stem.chars().rev();
    let last = tail.next()?;
    let prev = tail.next()?;
    (last == prev && !"aeiou".contains(last))
        .then(|| stem[..stem.len() - last.len_utf8()].to_string())
}

pub fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextFeatures {
    pub spelling_mistakes_ratio: f64,
    pub content_richness: f64,
}

impl TextFeatures {
    pub fn analyze(doc: &Document, dictionary: &Dictionary) -> Self {
        let text = visible_text(doc);
        let tokens = text.split_whitespace().collect::<Vec<_>>();

        let mut unknown = HashSet::new();
        for token in &tokens {
            let word = normalize_token(token);
            if !word.is_empty() && !dictionary.knows(&word) {
                unknown.insert(word);
            }
        }

        Self {
            spelling_mistakes_ratio: ratio(unknown.len(), tokens.len(), 2),
            content_richness: ratio(text.len(), doc.source().len(), 3),
        }
    }
}
