//! SQLite storage for the vector index.
//!
//! One file per index: a `meta` key/value table describing how the index was
//! built and a `chunks` table holding chunk rows with their embeddings.

use crate::embeddings::EmbeddingIdentity;
use crate::types::{Chunk, ChunkMetadata};
use chrono::{DateTime, Utc};
use policyqa_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Layout version written to `meta.schema_version`.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything recorded in the `meta` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub schema_version: u32,
    pub identity: EmbeddingIdentity,
    pub source: String,
    pub built_at: DateTime<Utc>,
    /// SHA-256 over the chunk texts in position order
    pub checksum: String,
}

/// Create a fresh index database at `db_path`.
pub fn create_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::IndexBuild(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::IndexBuild(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL,
            source TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| AppError::IndexBuild(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Open an existing index read-only. Never creates the file.
pub fn open_index(db_path: &Path) -> AppResult<Connection> {
    Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| AppError::IndexNotFound(format!("{}: {}", db_path.display(), e)))
}

pub fn write_manifest(conn: &Connection, manifest: &IndexManifest) -> AppResult<()> {
    let entries = [
        ("schema_version", manifest.schema_version.to_string()),
        ("embedding_provider", manifest.identity.provider.clone()),
        ("embedding_model", manifest.identity.model.clone()),
        ("embedding_dimensions", manifest.identity.dimensions.to_string()),
        ("source", manifest.source.clone()),
        ("built_at", manifest.built_at.to_rfc3339()),
        ("checksum", manifest.checksum.clone()),
    ];

    for (key, value) in entries {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| AppError::IndexBuild(format!("Failed to write meta '{}': {}", key, e)))?;
    }

    Ok(())
}

pub fn read_manifest(conn: &Connection) -> AppResult<IndexManifest> {
    let get = |key: &str| -> AppResult<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| AppError::IndexNotFound(format!("Missing meta '{}': {}", key, e)))
    };

    let parse_number = |key: &str| -> AppResult<usize> {
        get(key)?
            .parse::<usize>()
            .map_err(|e| AppError::IndexNotFound(format!("Invalid meta '{}': {}", key, e)))
    };

    let built_at = DateTime::parse_from_rfc3339(&get("built_at")?)
        .map_err(|e| AppError::IndexNotFound(format!("Invalid meta 'built_at': {}", e)))?
        .with_timezone(&Utc);

    Ok(IndexManifest {
        schema_version: parse_number("schema_version")? as u32,
        identity: EmbeddingIdentity {
            provider: get("embedding_provider")?,
            model: get("embedding_model")?,
            dimensions: parse_number("embedding_dimensions")?,
        },
        source: get("source")?,
        built_at,
        checksum: get("checksum")?,
    })
}

/// Insert a chunk with its embedding.
pub fn insert_chunk(conn: &Connection, chunk: &Chunk, embedding: &[f32]) -> AppResult<()> {
    let metadata_json = serde_json::to_string(&chunk.metadata)
        .map_err(|e| AppError::IndexBuild(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        "INSERT INTO chunks (position, id, source, text, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.position as i64,
            chunk.id,
            chunk.source,
            chunk.text,
            embedding_to_bytes(embedding),
            metadata_json,
        ],
    )
    .map_err(|e| AppError::IndexBuild(format!("Failed to insert chunk {}: {}", chunk.id, e)))?;

    Ok(())
}

/// All chunks with their embeddings, in position order.
pub fn read_chunks(conn: &Connection) -> AppResult<Vec<(Chunk, Vec<f32>)>> {
    let mut stmt = conn
        .prepare("SELECT position, id, source, text, embedding, metadata FROM chunks ORDER BY position")
        .map_err(|e| AppError::IndexNotFound(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(|e| AppError::IndexNotFound(format!("Failed to query chunks: {}", e)))?;

    let mut chunks = Vec::new();
    for row in rows {
        let (position, id, source, text, embedding_bytes, metadata_json) =
            row.map_err(|e| AppError::IndexNotFound(format!("Failed to read chunk row: {}", e)))?;

        let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
            .map_err(|e| AppError::IndexNotFound(format!("Invalid metadata for {}: {}", id, e)))?;

        let chunk = Chunk {
            id,
            source,
            position: position as u32,
            text,
            metadata,
        };
        chunks.push((chunk, bytes_to_embedding(&embedding_bytes)?));
    }

    Ok(chunks)
}

/// SHA-256 over the chunk texts, NUL separated, hex encoded.
pub fn chunks_checksum<'a, I>(texts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for text in texts {
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::IndexNotFound(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
