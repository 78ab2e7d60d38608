//! SQLite-backed vector index for knowledge chunks.

use crate::types::{KnowledgeChunk, KnowledgeSource, ScoredChunk};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use teller_core::{AppError, AppResult};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sources (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        content_hash TEXT NOT NULL UNIQUE,
        content_type TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        ingested_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        metadata TEXT,
        FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
"#;

/// Initialize the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

    create_schema(&conn)?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Open a throwaway in-memory index.
pub fn init_memory_index() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| AppError::Knowledge(format!("Failed to open in-memory index: {}", e)))?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| AppError::Knowledge(format!("Failed to enable foreign keys: {}", e)))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))
}

/// Insert a source into the index.
pub fn insert_source(conn: &Connection, source: &KnowledgeSource) -> AppResult<()> {
    conn.execute(
        "INSERT INTO sources (id, name, content_hash, content_type, size_bytes, ingested_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source.id,
            source.name,
            source.content_hash,
            source.content_type,
            source.size_bytes as i64,
            source.ingested_at.to_rfc3339(),
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert source: {}", e)))?;

    Ok(())
}

/// Insert a chunk with embedding into the index.
pub fn insert_chunk(conn: &Connection, chunk: &KnowledgeChunk) -> AppResult<()> {
    let embedding_bytes = embedding_to_bytes(
        chunk
            .embedding
            .as_ref()
            .ok_or_else(|| AppError::Knowledge("Chunk missing embedding".to_string()))?,
    );

    let metadata_json = serde_json::to_string(&chunk.metadata)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, source_id, position, text, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.position as i64,
            chunk.text,
            embedding_bytes,
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// Store a source and its chunks atomically, replacing any source with the
/// same content hash or the same name.
///
/// Returns true when an earlier copy was replaced.
pub fn replace_document(
    conn: &mut Connection,
    source: &KnowledgeSource,
    chunks: &[KnowledgeChunk],
) -> AppResult<bool> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to start transaction: {}", e)))?;

    let by_hash = delete_source_by_hash(&tx, &source.content_hash)?;
    let by_name = delete_sources_by_name(&tx, &source.name)?;
    insert_source(&tx, source)?;
    for chunk in chunks {
        insert_chunk(&tx, chunk)?;
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit document: {}", e)))?;

    Ok(by_hash || by_name > 0)
}

/// Find a source by content hash.
pub fn find_source_by_hash(conn: &Connection, content_hash: &str) -> AppResult<Option<KnowledgeSource>> {
    conn.query_row(
        "SELECT id, name, content_hash, content_type, size_bytes, ingested_at
         FROM sources WHERE content_hash = ?1",
        params![content_hash],
        row_to_source,
    )
    .optional()
    .map_err(|e| AppError::Knowledge(format!("Failed to look up source: {}", e)))
}

/// Delete the source with `content_hash` and its chunks.
///
/// Returns true when a source was deleted.
pub fn delete_source_by_hash(conn: &Connection, content_hash: &str) -> AppResult<bool> {
    let Some(source) = find_source_by_hash(conn, content_hash)? else {
        return Ok(false);
    };

    delete_source(conn, &source)?;
    Ok(true)
}

/// Delete every source named `name` and its chunks.
///
/// Returns the number of sources deleted.
pub fn delete_sources_by_name(conn: &Connection, name: &str) -> AppResult<usize> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, content_hash, content_type, size_bytes, ingested_at
             FROM sources WHERE name = ?1",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let stale = stmt
        .query_map(params![name], row_to_source)
        .map_err(|e| AppError::Knowledge(format!("Failed to look up source: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Knowledge(format!("Failed to read source: {}", e)))?;

    for source in &stale {
        delete_source(conn, source)?;
    }
    Ok(stale.len())
}

fn delete_source(conn: &Connection, source: &KnowledgeSource) -> AppResult<()> {
    conn.execute("DELETE FROM chunks WHERE source_id = ?1", params![source.id])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;
    conn.execute("DELETE FROM sources WHERE id = ?1", params![source.id])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete source: {}", e)))?;

    tracing::debug!("Removed earlier copy of '{}' ({})", source.name, source.id);
    Ok(())
}

/// All sources, most recent first.
pub fn list_sources(conn: &Connection) -> AppResult<Vec<KnowledgeSource>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, content_hash, content_type, size_bytes, ingested_at
             FROM sources ORDER BY ingested_at DESC",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let sources = stmt
        .query_map([], row_to_source)
        .map_err(|e| AppError::Knowledge(format!("Failed to list sources: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Knowledge(format!("Failed to read source: {}", e)))?;

    Ok(sources)
}

fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeSource> {
    let ingested_at: String = row.get(5)?;
    Ok(KnowledgeSource {
        id: row.get(0)?,
        name: row.get(1)?,
        content_hash: row.get(2)?,
        content_type: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        ingested_at: parse_timestamp(&ingested_at)?,
    })
}

fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))
}

/// Query the index for top-k most similar chunks.
///
/// Rows whose stored vector cannot be decoded are skipped with a warning.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<ScoredChunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.source_id, c.position, c.text, c.embedding, c.metadata, s.name
             FROM chunks c JOIN sources s ON s.id = c.source_id",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            let metadata_json: Option<String> = row.get(5)?;
            Ok((
                KnowledgeChunk {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    position: row.get::<_, i64>(2)? as u32,
                    text: row.get(3)?,
                    embedding: None,
                    metadata: metadata_json
                        .and_then(|m| serde_json::from_str(&m).ok())
                        .unwrap_or(serde_json::Value::Null),
                },
                embedding_bytes,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (chunk, embedding_bytes, source_name) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk: {}", e)))?;

        match bytes_to_embedding(&embedding_bytes) {
            Ok(embedding) => {
                let score = cosine_similarity(query_embedding, &embedding);
                results.push(ScoredChunk {
                    chunk,
                    source_name,
                    score,
                });
            }
            Err(e) => tracing::warn!("Skipping chunk {}: {}", chunk.id, e),
        }
    }

    // Sort by score descending
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    // Take top-k
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Get (sources, chunks) counts for the index.
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32)> {
    let sources_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM sources", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count sources: {}", e)))?;

    let chunks_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM chunks", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))?;

    Ok((sources_count, chunks_count))
}

/// Most recent ingestion time, if any source exists.
pub fn last_ingested_at(conn: &Connection) -> AppResult<Option<DateTime<Utc>>> {
    let latest: Option<String> = conn
        .query_row("SELECT MAX(ingested_at) FROM sources", [], |row| row.get(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to read last ingestion: {}", e)))?;

    latest
        .map(|value| {
            parse_timestamp(&value)
                .map_err(|e| AppError::Knowledge(format!("Invalid ingestion time: {}", e)))
        })
        .transpose()
}

/// Reset the index (delete all data).
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute("DELETE FROM chunks", [])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;

    conn.execute("DELETE FROM sources", [])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete sources: {}", e)))?;

    tracing::info!("Reset knowledge base index");
    Ok(())
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
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
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
