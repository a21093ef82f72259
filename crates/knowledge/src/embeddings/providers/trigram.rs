//! Offline embeddings from hashed character trigrams and words.

use crate::embeddings::provider::EmbeddingProvider;
use policyqa_core::AppResult;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

const STOP_WORDS: [&str; 38] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "does", "my", "what", "under", "any", "will",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Deterministic bag-of-trigrams embedder.
///
/// Not semantic, but stable across runs and platforms and strongly driven by
/// shared vocabulary, which is what clause lookup in policy text needs.
/// Vectors are unit length; text with no usable tokens embeds to zeros.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn tokens(text: &str) -> BTreeMap<String, u32> {
        let lower = text.to_lowercase();
        let mut freq = BTreeMap::new();

        for raw in lower.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let keep = word.chars().count() > 2 || word.chars().any(|c| c.is_ascii_digit());
            if word.is_empty() || !keep || stop_words().contains(word) {
                continue;
            }
            *freq.entry(word.to_string()).or_insert(0) += 1;
        }

        freq
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes
            .iter()
            .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(*b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for (word, freq) in Self::tokens(text) {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = self.bucket(trigram.as_bytes(), 37);
                embedding[idx] += (freq as f32).sqrt();
            }

            // Whole word carries more weight than any single trigram
            let idx = self.bucket(word.as_bytes(), 31);
            embedding[idx] += freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_trigram_provider_dimensions() {
        let provider = TrigramProvider::new(384);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[tokio::test]
    async fn test_embedding_is_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("maternity expenses are covered").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_trigram_provider_deterministic() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("grace period of thirty days").await.unwrap();
        let b = provider.embed("grace period of thirty days").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let provider = TrigramProvider::new(384);
        let query = provider
            .embed("Does my policy cover artificial pregnancy?")
            .await
            .unwrap();
        let relevant = provider
            .embed("Clause 5.2: This policy covers maternity expenses including artificial pregnancy procedures.")
            .await
            .unwrap();
        let unrelated = provider
            .embed("Clause 9.1: Vehicle towing is reimbursed up to the stated limit.")
            .await
            .unwrap();

        assert!(cosine(&query, &relevant) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_clause_numbers_are_tokens() {
        let tokens = TrigramProvider::tokens("See clause 5.2, not 12.");
        assert!(tokens.contains_key("5.2"));
        assert!(tokens.contains_key("12"));
        assert!(tokens.contains_key("clause"));
    }

    #[tokio::test]
    async fn test_empty_text_zero_vector() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("").await.unwrap();
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_utf8_safety() {
        let provider = TrigramProvider::new(384);
        let embedding = provider
            .embed("Cobertura de maternidade é garantida 🎉 após carência")
            .await
            .unwrap();
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
