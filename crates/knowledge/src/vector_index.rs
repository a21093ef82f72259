//! Persisted nearest-neighbour index over document chunks.
//!
//! An index is built once per document and is read-only afterwards. The file
//! at a location is only ever replaced whole: `build` writes a temporary
//! sibling and renames it over the target.

use crate::embeddings::{EmbeddingIdentity, EmbeddingProvider};
use crate::index::{self, IndexManifest, SCHEMA_VERSION};
use crate::types::Chunk;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policyqa_core::{AppError, AppResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Text lookup used by the retriever.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Up to `k` chunk texts most similar to `query`, best first.
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<String>>;
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub location: PathBuf,
    pub chunk_count: usize,
    pub identity: EmbeddingIdentity,
    pub source: String,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    embedder: Arc<dyn EmbeddingProvider>,
    location: PathBuf,
    manifest: IndexManifest,
}

impl VectorIndex {
    /// Embed `chunks` and persist them at `location`, replacing any index there.
    #[instrument(skip(chunks, embedder), fields(chunks = chunks.len(), location = %location.display()))]
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
        location: &Path,
    ) -> AppResult<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| AppError::IndexBuild(format!("Embedding failed: {}", e)))?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::IndexBuild(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let manifest = IndexManifest {
            schema_version: SCHEMA_VERSION,
            identity: embedder.identity(),
            source: chunks
                .first()
                .map(|c| c.source.clone())
                .unwrap_or_default(),
            built_at: Utc::now(),
            checksum: index::chunks_checksum(texts.iter().map(String::as_str)),
        };

        let entries: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();

        let temp_path = temp_sibling(location);
        if let Err(e) = write_index(&temp_path, &manifest, &entries) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        std::fs::rename(&temp_path, location).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            AppError::IndexBuild(format!(
                "Failed to publish index at {}: {}",
                location.display(),
                e
            ))
        })?;

        info!(
            "Built index with {} chunks at {}",
            entries.len(),
            location.display()
        );

        Ok(Self {
            entries,
            embedder,
            location: location.to_path_buf(),
            manifest,
        })
    }

    /// Open the index persisted at `location`.
    ///
    /// Fails with `IndexNotFound` when the file is absent or unreadable, uses a
    /// different schema version, was built by a different embedder, or its
    /// contents no longer match the recorded checksum.
    pub fn load(location: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if !location.is_file() {
            return Err(AppError::IndexNotFound(location.display().to_string()));
        }

        let conn = index::open_index(location)?;
        let manifest = index::read_manifest(&conn)?;

        if manifest.schema_version != SCHEMA_VERSION {
            return Err(AppError::IndexNotFound(format!(
                "{}: schema version {} (expected {})",
                location.display(),
                manifest.schema_version,
                SCHEMA_VERSION
            )));
        }

        let identity = embedder.identity();
        if manifest.identity != identity {
            return Err(AppError::IndexNotFound(format!(
                "{}: built with {}/{} ({} dims), current embedder is {}/{} ({} dims)",
                location.display(),
                manifest.identity.provider,
                manifest.identity.model,
                manifest.identity.dimensions,
                identity.provider,
                identity.model,
                identity.dimensions
            )));
        }

        let entries = index::read_chunks(&conn)?;

        let checksum = index::chunks_checksum(entries.iter().map(|(c, _)| c.text.as_str()));
        if checksum != manifest.checksum {
            return Err(AppError::IndexNotFound(format!(
                "{}: checksum mismatch",
                location.display()
            )));
        }

        if let Some((chunk, _)) = entries.iter().find(|(_, e)| e.len() != identity.dimensions) {
            return Err(AppError::IndexNotFound(format!(
                "{}: chunk {} has wrong embedding size",
                location.display(),
                chunk.id
            )));
        }

        debug!("Loaded index with {} chunks from {}", entries.len(), location.display());

        Ok(Self {
            entries,
            embedder,
            location: location.to_path_buf(),
            manifest,
        })
    }

    /// Up to `k` chunks by descending cosine similarity, ties in chunk order.
    pub async fn search_scored(&self, query: &str, k: usize) -> AppResult<Vec<(&Chunk, f32)>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut results: Vec<(&Chunk, f32)> = self
            .entries
            .iter()
            .map(|(chunk, embedding)| (chunk, index::cosine_similarity(&query_embedding, embedding)))
            .collect();

        // Stable sort keeps position order among equal scores
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        debug!("Retrieved {} chunks (requested top-{})", results.len(), k);

        Ok(results)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            location: self.location.clone(),
            chunk_count: self.entries.len(),
            identity: self.manifest.identity.clone(),
            source: self.manifest.source.clone(),
            built_at: self.manifest.built_at,
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SearchIndex for VectorIndex {
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<String>> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|(chunk, _)| chunk.text.clone())
            .collect())
    }
}

fn temp_sibling(location: &Path) -> PathBuf {
    let file_name = location
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "index.sqlite".to_string());
    location.with_file_name(format!("{}.tmp-{}", file_name, uuid::Uuid::new_v4()))
}

fn write_index(path: &Path, manifest: &IndexManifest, entries: &[(Chunk, Vec<f32>)]) -> AppResult<()> {
    let mut conn = index::create_index(path)?;
    let tx = conn
        .transaction()
        .map_err(|e| AppError::IndexBuild(format!("Failed to begin transaction: {}", e)))?;

    index::write_manifest(&tx, manifest)?;
    for (chunk, embedding) in entries {
        index::insert_chunk(&tx, chunk, embedding)?;
    }

    tx.commit()
        .map_err(|e| AppError::IndexBuild(format!("Failed to commit index: {}", e)))?;
    conn.close()
        .map_err(|(_, e)| AppError::IndexBuild(format!("Failed to close index: {}", e)))?;
    Ok(())
}
