//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document stored in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// Unique source identifier
    pub id: String,

    /// Display name (file name or upload name)
    pub name: String,

    /// SHA-256 of the raw document bytes, hex encoded
    pub content_hash: String,

    /// Detected content type ("markdown", "html", "pdf", "text")
    pub content_type: String,

    /// Raw document size in bytes
    pub size_bytes: u64,

    /// When this source was ingested
    pub ingested_at: DateTime<Utc>,
}

/// A text chunk with embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Unique chunk identifier
    pub id: String,

    /// Source document ID
    pub source_id: String,

    /// Position within source
    pub position: u32,

    /// Text content
    pub text: String,

    /// Embedding vector (normalized)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Metadata (byte range within the extracted text)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A chunk returned by a search, with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The matching chunk (embedding stripped)
    pub chunk: KnowledgeChunk,

    /// Name of the source document
    pub source_name: String,

    /// Cosine similarity to the query
    pub score: f32,
}

/// A document handed to the knowledge base, e.g. from an upload form.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// File name, used for content type detection
    pub name: String,

    /// Raw bytes
    pub bytes: Vec<u8>,
}

impl DocumentInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub source_id: String,
    pub name: String,
    pub chunks: u32,
    pub bytes: u64,
    /// An earlier copy with the same content hash was replaced
    pub replaced: bool,
}

/// Per-file entry of a [`LoadReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub name: String,
    pub chunks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a batch load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub files: Vec<FileReport>,
    pub loaded_files: u32,
    pub failed_files: u32,
    pub total_chunks: u32,
}

impl LoadReport {
    /// Record a successful ingestion.
    pub fn push_success(&mut self, outcome: &IngestOutcome) {
        self.loaded_files += 1;
        self.total_chunks += outcome.chunks;
        self.files.push(FileReport {
            name: outcome.name.clone(),
            chunks: outcome.chunks,
            error: None,
        });
    }

    /// Record a failed file.
    pub fn push_failure(&mut self, name: impl Into<String>, error: impl ToString) {
        self.failed_files += 1;
        self.files.push(FileReport {
            name: name.into(),
            chunks: 0,
            error: Some(error.to_string()),
        });
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: LoadReport) {
        self.loaded_files += other.loaded_files;
        self.failed_files += other.failed_files;
        self.total_chunks += other.total_chunks;
        self.files.extend(other.files);
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        if self.total_chunks == 0 {
            return "No processable document content found".to_string();
        }

        let mut text = format!(
            "Loaded {} document chunks from {} file(s)",
            self.total_chunks, self.loaded_files
        );
        if self.failed_files > 0 {
            text.push_str(&format!(", {} file(s) failed", self.failed_files));
        }
        text
    }
}

/// Statistics for the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    /// Number of sources
    pub sources_count: u32,

    /// Number of chunks
    pub chunks_count: u32,

    /// Database size in bytes
    pub db_size_bytes: u64,

    /// Most recent ingestion
    pub last_ingested_at: Option<DateTime<Utc>>,
}

/// Internal chunk candidate before embedding.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub source_id: String,
    pub position: u32,
    pub text: String,
    pub metadata: serde_json::Value,
}
