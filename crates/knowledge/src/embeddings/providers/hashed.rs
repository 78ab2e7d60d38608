//! Offline hashed embedding provider.

use crate::embeddings::provider::EmbeddingProvider;
use std::collections::HashMap;
use teller_core::{AppError, AppResult};
use unicode_segmentation::UnicodeSegmentation;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "do", "does", "can", "you", "your",
    "我", "的", "了", "是", "吗", "呢", "你", "们",
];

/// Hashed feature embeddings for local, offline operation.
///
/// Words contribute a whole-word feature plus their character trigrams.
/// CJK text has no spaces, so runs of CJK characters contribute unigram
/// and bigram features instead. Features are hashed into a fixed number of
/// dimensions and the vector is normalized to unit length. Not semantic,
/// but deterministic and content dependent.
#[derive(Debug, Clone, Copy)]
pub struct HashedProvider {
    dimensions: usize,
}

impl HashedProvider {
    /// Create a new hashed provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let lower = text.to_lowercase();

        for (feature, weight) in features(&lower) {
            let idx = (hash(&feature) % self.dimensions as u64) as usize;
            embedding[idx] += weight;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

/// Weighted features of lowercased text.
fn features(lower: &str) -> HashMap<String, f32> {
    let mut word_freq: HashMap<&str, u32> = HashMap::new();
    for word in lower.unicode_words() {
        if word.chars().any(is_cjk) || STOP_WORDS.contains(&word) || word.chars().count() < 2 {
            continue;
        }
        *word_freq.entry(word).or_insert(0) += 1;
    }

    let mut features: HashMap<String, f32> = HashMap::new();

    for (word, freq) in word_freq {
        // sqrt scale keeps repeated trigrams from dominating
        let chars: Vec<char> = word.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            *features.entry(format!("t:{}", trigram)).or_insert(0.0) += (freq as f32).sqrt();
        }

        *features.entry(format!("w:{}", word)).or_insert(0.0) += freq as f32;
    }

    for run in cjk_runs(lower) {
        for ch in &run {
            let unigram = ch.to_string();
            if STOP_WORDS.contains(&unigram.as_str()) {
                continue;
            }
            *features.entry(format!("c:{}", unigram)).or_insert(0.0) += 0.5;
        }
        for pair in run.windows(2) {
            let bigram: String = pair.iter().collect();
            *features.entry(format!("b:{}", bigram)).or_insert(0.0) += 1.0;
        }
    }

    features
}

/// Maximal runs of consecutive CJK characters.
fn cjk_runs(text: &str) -> Vec<Vec<char>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();

    for ch in text.chars() {
        if is_cjk(ch) {
            current.push(ch);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3040..=0x30FF     // Hiragana, Katakana
        | 0x3400..=0x4DBF   // CJK Extension A
        | 0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0xF900..=0xFAFF   // CJK Compatibility Ideographs
        | 0x20000..=0x2A6DF // CJK Extension B
    )
}

/// FNV-1a; stable across runs and platforms.
fn hash(feature: &str) -> u64 {
    feature.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashedProvider {
    fn provider_name(&self) -> &str {
        "hashed"
    }

    fn model_name(&self) -> &str {
        "hashed-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let provider = *self;
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || texts.iter().map(|text| provider.embed_text(text)).collect())
            .await
            .map_err(|e| AppError::Knowledge(format!("Hashed embedding task failed: {}", e)))
    }
}
