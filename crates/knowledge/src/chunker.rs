//! Overlapping semantic chunking.
//!
//! Splits at the coarsest boundary that fits: paragraphs, then sentences,
//! then words, then characters. Sizes are measured in characters.

use crate::types::{Chunk, ChunkMetadata};
use policyqa_core::config::ChunkingSettings;
use policyqa_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

/// Splits documents into [`Chunk`]s of bounded size.
pub struct Chunker {
    max_size: usize,
    overlap: usize,
    splitter: TextSplitter<text_splitter::Characters>,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// Fails with `AppError::Config` if `overlap >= max_size` or `max_size == 0`.
    pub fn new(max_size: usize, overlap: usize) -> AppResult<Self> {
        if max_size == 0 {
            return Err(AppError::Config(
                "Chunk max size must be greater than 0".to_string(),
            ));
        }

        let config = ChunkConfig::new(max_size)
            .with_overlap(overlap)
            .map_err(|e| {
                AppError::Config(format!(
                    "Invalid chunk overlap {} for max size {}: {}",
                    overlap, max_size, e
                ))
            })?;

        Ok(Self {
            max_size,
            overlap,
            splitter: TextSplitter::new(config),
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> AppResult<Self> {
        Self::new(settings.max_size, settings.overlap)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks tagged with `source`.
    ///
    /// Blank text yields no chunks; text shorter than the max size yields one.
    pub fn chunk(&self, text: &str, source: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chunks: Vec<Chunk> = self
            .splitter
            .chunk_indices(text)
            .filter(|(_, chunk_text)| !chunk_text.trim().is_empty())
            .enumerate()
            .map(|(position, (offset, chunk_text))| {
                let hash = calculate_hash(chunk_text);
                Chunk {
                    id: format!("chunk-{:05}-{}", position, &hash[..12]),
                    source: source.to_string(),
                    position: position as u32,
                    text: chunk_text.to_string(),
                    metadata: ChunkMetadata {
                        byte_range: (offset, offset + chunk_text.len()),
                        char_count: chunk_text.chars().count(),
                        hash,
                    },
                }
            })
            .collect();

        tracing::debug!(
            "Chunked {} bytes from {} into {} chunks (max: {}, overlap: {})",
            text.len(),
            source,
            chunks.len(),
            self.max_size,
            self.overlap
        );

        chunks
    }
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("max_size", &self.max_size)
            .field("overlap", &self.overlap)
            .finish()
    }
}

/// SHA-256 of `text`, hex encoded.
pub fn calculate_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_text() -> String {
        let mut text = String::new();
        for section in 1..=12 {
            text.push_str(&format!(
                "Section {section}. The insurer shall reimburse eligible expenses under clause {section}.1 \
                 subject to the waiting period and the sum insured stated in the schedule. \
                 Claims must be notified within thirty days of discharge.\n\n"
            ));
        }
        text
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::new(1100, 150).unwrap();
        let chunks = chunker.chunk("Clause 5.2: maternity expenses are covered.", "policy.pdf");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Clause 5.2: maternity expenses are covered.");
        assert_eq!(chunks[0].source, "policy.pdf");
        assert_eq!(chunks[0].position, 0);
    }

    #[test]
    fn test_blank_text_no_chunks() {
        let chunker = Chunker::new(1100, 150).unwrap();
        assert!(chunker.chunk("", "a").is_empty());
        assert!(chunker.chunk("  \n\n\t ", "a").is_empty());
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let chunker = Chunker::new(200, 40).unwrap();
        let text = policy_text();
        let chunks = chunker.chunk(&text, "policy.txt");

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.metadata.char_count <= 200, "chunk too large: {}", chunk.metadata.char_count);
            assert_eq!(chunk.metadata.char_count, chunk.text.chars().count());
        }
    }

    #[test]
    fn test_chunks_cover_text() {
        let chunker = Chunker::new(200, 40).unwrap();
        let text = policy_text();
        let chunks = chunker.chunk(&text, "policy.txt");

        let mut covered = vec![false; text.len()];
        for chunk in &chunks {
            let (start, end) = chunk.metadata.byte_range;
            assert_eq!(&text[start..end], chunk.text);
            covered[start..end].iter_mut().for_each(|c| *c = true);
        }

        for (i, byte) in text.bytes().enumerate() {
            if !covered[i] {
                assert!(byte.is_ascii_whitespace(), "byte {} not covered", i);
            }
        }
    }

    #[test]
    fn test_overlap_bounded() {
        let chunker = Chunker::new(200, 40).unwrap();
        let text = policy_text();
        let chunks = chunker.chunk(&text, "policy.txt");

        for pair in chunks.windows(2) {
            let (_, prev_end) = pair[0].metadata.byte_range;
            let (next_start, _) = pair[1].metadata.byte_range;
            if next_start < prev_end {
                assert!(prev_end - next_start <= 40);
            }
            assert!(pair[1].position == pair[0].position + 1);
        }
    }

    #[test]
    fn test_chunk_count_is_minimal() {
        let (max, overlap) = (50, 10);
        for n in 1..=5 {
            // A single unbroken run forces character-level splits
            let len = n * (max - overlap) + overlap;
            let text: String = "abcdefghij".chars().cycle().take(len).collect();

            let chunks = Chunker::new(max, overlap).unwrap().chunk(&text, "policy.txt");
            assert_eq!(chunks.len(), n, "length {} should need {} chunks", len, n);
            assert!(chunks.iter().all(|c| c.metadata.char_count <= max));
            assert_eq!(chunks.last().unwrap().metadata.byte_range.1, len);

            let no_overlap: String = "abcdefghij".chars().cycle().take(n * max).collect();
            let chunks = Chunker::new(max, 0).unwrap().chunk(&no_overlap, "policy.txt");
            assert_eq!(chunks.len(), n);
        }
    }

    #[test]
    fn test_overlap_must_be_smaller_than_max() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(0, 0).is_err());
    }

    #[test]
    fn test_chunk_ids_stable() {
        let chunker = Chunker::new(200, 40).unwrap();
        let text = policy_text();
        let a = chunker.chunk(&text, "policy.txt");
        let b = chunker.chunk(&text, "policy.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn test_utf8_text() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "Cobertura de maternidade é garantida após carência de nove meses. ".repeat(10);
        let chunks = chunker.chunk(&text, "apolice.txt");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.metadata.char_count <= 50));
    }

    #[test]
    fn test_calculate_hash() {
        let hash = calculate_hash("Hello, world!");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, calculate_hash("Hello, world!"));
        assert_ne!(hash, calculate_hash("Hello, world?"));
    }
}
