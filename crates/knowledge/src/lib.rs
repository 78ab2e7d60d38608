//! Knowledge base management system.
//!
//! Provides local-first RAG using SQLite and embeddings: documents are
//! parsed, split into overlapping chunks, embedded and stored in a single
//! SQLite index shared by every chat session.

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use types::{
    BaseStats, DocumentInput, FileReport, IngestOutcome, KnowledgeChunk, KnowledgeSource,
    LoadReport, ScoredChunk,
};

use chrono::Utc;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use teller_core::config::KnowledgeSettings;
use teller_core::{AppConfig, AppError, AppResult};
use walkdir::WalkDir;

/// The shared knowledge base.
///
/// The SQLite connection sits behind a mutex that is only taken for
/// synchronous index calls; embeddings are computed before locking.
pub struct KnowledgeBase {
    conn: Mutex<Connection>,
    index_path: Option<PathBuf>,
    provider: Arc<dyn EmbeddingProvider>,
    settings: KnowledgeSettings,
}

impl KnowledgeBase {
    /// Open (or create) the index at `index_path`.
    pub fn open(
        index_path: &Path,
        settings: KnowledgeSettings,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let conn = index::init_index(index_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            index_path: Some(index_path.to_path_buf()),
            provider,
            settings,
        })
    }

    /// Knowledge base backed by an in-memory index.
    pub fn in_memory(
        settings: KnowledgeSettings,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        Ok(Self {
            conn: Mutex::new(index::init_memory_index()?),
            index_path: None,
            provider,
            settings,
        })
    }

    /// Open the index configured in `config`, creating the embedding
    /// provider from the `knowledge.embedding` section.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedding = &config.knowledge.embedding;
        let api_key = embedding
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.trim().is_empty());

        let provider = create_provider(embedding, api_key.as_deref())?;

        tracing::debug!(
            "Knowledge base embeddings: provider={}, model={}, dimensions={}",
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions()
        );

        Self::open(&config.index_path(), config.knowledge.clone(), provider)
    }

    /// Retrieval settings in use.
    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> AppResult<T>) -> AppResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Knowledge("Knowledge index lock poisoned".to_string()))?;
        f(&mut conn)
    }

    /// Parse, chunk, embed and store one document.
    ///
    /// A document whose content hash or name is already indexed replaces the
    /// old copy, so an edited file never leaves stale chunks behind.
    pub async fn ingest_bytes(&self, name: &str, bytes: &[u8]) -> AppResult<IngestOutcome> {
        tracing::debug!("Ingesting document: {}", name);

        let content_type = parser::ContentType::from_name(name);
        let source_id = uuid::Uuid::new_v4().to_string();

        // PDF extraction and hashing are CPU bound, keep them off the runtime
        let (candidates, hash) = {
            let file_name = name.to_string();
            let bytes = bytes.to_vec();
            let id = source_id.clone();
            let (chunk_size, chunk_overlap) = (self.settings.chunk_size, self.settings.chunk_overlap);

            tokio::task::spawn_blocking(move || {
                let text = parser::parse_bytes(&file_name, &bytes)?;
                let candidates = chunker::chunk_text(&id, &text, chunk_size, chunk_overlap)?;
                Ok::<_, AppError>((candidates, content_hash(&bytes)))
            })
            .await
            .map_err(|e| AppError::Knowledge(format!("Parsing {} failed: {}", name, e)))??
        };

        if candidates.is_empty() {
            return Err(AppError::Knowledge(format!("{} contains no text", name)));
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.provider.embed_batch(&texts).await?;
        if embeddings.len() != candidates.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                candidates.len()
            )));
        }

        let chunks: Vec<KnowledgeChunk> = candidates
            .into_iter()
            .zip(embeddings)
            .map(|(candidate, embedding)| KnowledgeChunk {
                id: uuid::Uuid::new_v4().to_string(),
                source_id: candidate.source_id,
                position: candidate.position,
                text: candidate.text,
                embedding: Some(embedding),
                metadata: candidate.metadata,
            })
            .collect();

        let source = KnowledgeSource {
            id: source_id.clone(),
            name: name.to_string(),
            content_hash: hash,
            content_type: content_type.as_str().to_string(),
            size_bytes: bytes.len() as u64,
            ingested_at: Utc::now(),
        };

        let replaced = self.with_conn(|conn| index::replace_document(conn, &source, &chunks))?;

        if replaced {
            tracing::info!("Re-ingested {} ({} chunks), replacing earlier copy", name, chunks.len());
        } else {
            tracing::info!("Ingested {} ({} chunks)", name, chunks.len());
        }

        Ok(IngestOutcome {
            source_id,
            name: name.to_string(),
            chunks: chunks.len() as u32,
            bytes: source.size_bytes,
            replaced,
        })
    }

    /// Ingest a file, or every supported file under a directory.
    ///
    /// An explicitly named file is always attempted; a directory walk skips
    /// unsupported extensions. Failing files are recorded and skipped.
    pub async fn ingest_path(&self, path: &Path) -> AppResult<LoadReport> {
        if !path.exists() {
            return Err(AppError::Knowledge(format!("Path not found: {:?}", path)));
        }

        let start = Instant::now();
        let mut report = LoadReport::default();

        let files: Vec<PathBuf> = if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| parser::is_supported(&p.to_string_lossy()))
                .collect()
        };

        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.to_string_lossy().to_string());

            let result = match std::fs::read(&file) {
                Ok(bytes) => self.ingest_bytes(&name, &bytes).await,
                Err(e) => Err(AppError::Knowledge(format!("Failed to read {:?}: {}", file, e))),
            };

            match result {
                Ok(outcome) => report.push_success(&outcome),
                Err(e) => {
                    tracing::error!("Failed to process file {:?}: {}", file, e);
                    report.push_failure(name, e);
                }
            }
        }

        tracing::info!(
            "Ingested {:?}: {} files, {} chunks, {} failed in {:.2}s",
            path,
            report.loaded_files,
            report.total_chunks,
            report.failed_files,
            start.elapsed().as_secs_f64()
        );

        Ok(report)
    }

    /// Ingest a batch of uploaded documents.
    ///
    /// Never fails as a whole: each file's outcome is in the report.
    pub async fn load_documents(&self, files: &[DocumentInput]) -> LoadReport {
        let mut report = LoadReport::default();

        for file in files {
            match self.ingest_bytes(&file.name, &file.bytes).await {
                Ok(outcome) => {
                    tracing::info!("Processed file: {}", file.name);
                    report.push_success(&outcome);
                }
                Err(e) => {
                    tracing::error!("Failed to process file {}: {}", file.name, e);
                    report.push_failure(file.name.clone(), e);
                }
            }
        }

        tracing::info!("{}", report.summary());
        report
    }

    /// Top-`k` chunks for `query`, dropping those below the minimum score.
    pub async fn search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        tracing::info!("Searching knowledge base: {}", query);

        let query_embedding = self.provider.embed(query).await?;
        let results =
            self.with_conn(|conn| index::query_chunks(conn, &query_embedding, k))?;

        if !results.is_empty() {
            let all_scores: Vec<f32> = results.iter().map(|r| r.score).collect();
            tracing::debug!(
                "Retrieved {} chunks before filtering - scores: {:?}",
                results.len(),
                all_scores
            );
        }

        let min_score = self.settings.min_score;
        let filtered: Vec<ScoredChunk> = results
            .into_iter()
            .filter(|r| r.score >= min_score)
            .collect();

        match (filtered.first(), filtered.last()) {
            (Some(top), Some(lowest)) => tracing::info!(
                "Retrieved {} relevant chunks (top score: {:.3}, lowest: {:.3})",
                filtered.len(),
                top.score,
                lowest.score
            ),
            _ => tracing::info!(
                "No relevant chunks found (all scores below {:.2} threshold)",
                min_score
            ),
        }

        Ok(filtered)
    }

    /// True when no chunk has been indexed yet.
    pub fn is_empty(&self) -> AppResult<bool> {
        let (_, chunks) = self.with_conn(|conn| index::get_stats(conn))?;
        Ok(chunks == 0)
    }

    /// Counts, size and last ingestion time.
    pub fn stats(&self) -> AppResult<BaseStats> {
        let (sources_count, chunks_count, last_ingested_at) = self.with_conn(|conn| {
            let (sources, chunks) = index::get_stats(conn)?;
            Ok((sources, chunks, index::last_ingested_at(conn)?))
        })?;

        let db_size_bytes = self
            .index_path
            .as_ref()
            .and_then(|path| std::fs::metadata(path).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(BaseStats {
            sources_count,
            chunks_count,
            db_size_bytes,
            last_ingested_at,
        })
    }

    /// Indexed sources, most recent first.
    pub fn sources(&self) -> AppResult<Vec<KnowledgeSource>> {
        self.with_conn(|conn| index::list_sources(conn))
    }

    /// Delete every source and chunk.
    pub fn clean(&self) -> AppResult<()> {
        tracing::info!("Cleaning knowledge base");
        self.with_conn(|conn| index::reset_index(conn))
    }
}

/// SHA-256 of `bytes`, hex encoded.
fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod kb_tests {
    use super::*;
    use crate::embeddings::HashedProvider;
    use tempfile::TempDir;

    fn settings() -> KnowledgeSettings {
        KnowledgeSettings {
            chunk_size: 200,
            chunk_overlap: 20,
            ..Default::default()
        }
    }

    fn knowledge_base() -> KnowledgeBase {
        KnowledgeBase::in_memory(settings(), Arc::new(HashedProvider::new(2048))).unwrap()
    }

    const MORTGAGE: &str = "Mortgage applications require proof of income, an identity document and \
        a property valuation. Mortgage approval usually takes ten working days.";
    const CARDS: &str = "Credit card limits can be raised after six months of on-time payments. \
        Contact the card centre to request a credit limit review.";

    #[tokio::test]
    async fn test_new_knowledge_base_is_empty() {
        let kb = knowledge_base();
        assert!(kb.is_empty().unwrap());
        assert!(kb.search("mortgage", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_and_search_ranks_relevant_first() {
        let kb = knowledge_base();
        kb.ingest_bytes("mortgage.txt", MORTGAGE.as_bytes()).await.unwrap();
        kb.ingest_bytes("cards.md", CARDS.as_bytes()).await.unwrap();

        let results = kb.search("What do mortgage applications require?", 4).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].source_name, "mortgage.txt");
        assert!(!kb.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_search_drops_irrelevant_chunks() {
        let kb = knowledge_base();
        kb.ingest_bytes("mortgage.txt", MORTGAGE.as_bytes()).await.unwrap();

        let results = kb.search("xylophone quokka", 4).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reingest_same_content_replaces() {
        let kb = knowledge_base();
        let first = kb.ingest_bytes("mortgage.txt", MORTGAGE.as_bytes()).await.unwrap();
        let second = kb.ingest_bytes("mortgage-copy.txt", MORTGAGE.as_bytes()).await.unwrap();

        assert!(!first.replaced);
        assert!(second.replaced);

        let stats = kb.stats().unwrap();
        assert_eq!(stats.sources_count, 1);
        assert_eq!(stats.chunks_count, second.chunks);
        assert_eq!(kb.sources().unwrap()[0].name, "mortgage-copy.txt");
    }

    #[tokio::test]
    async fn test_reingest_edited_file_drops_old_chunks() {
        let kb = knowledge_base();
        kb.ingest_bytes("rates.md", b"The savings account interest rate is 1.5% per year.")
            .await
            .unwrap();
        let second = kb
            .ingest_bytes("rates.md", b"The savings account interest rate is 1.2% per year.")
            .await
            .unwrap();
        assert!(second.replaced);

        assert_eq!(kb.stats().unwrap().sources_count, 1);
        let results = kb.search("savings account interest rate", 4).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.chunk.text.contains("1.2%")));
        assert!(results.iter().all(|r| !r.chunk.text.contains("1.5%")));
    }

    #[tokio::test]
    async fn test_serve_relearn_after_edit_keeps_one_copy() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("data");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("mortgage.md"), MORTGAGE).unwrap();

        let kb = knowledge_base();
        kb.ingest_path(&docs).await.unwrap();
        std::fs::write(docs.join("mortgage.md"), format!("{} Fees are waived.", MORTGAGE)).unwrap();
        kb.ingest_path(&docs).await.unwrap();

        let sources = kb.sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "mortgage.md");
    }

    #[tokio::test]
    async fn test_load_documents_skips_bad_files() {
        let kb = knowledge_base();
        let files = vec![
            DocumentInput::new("mortgage.txt", MORTGAGE),
            DocumentInput::new("broken.txt", vec![0xff, 0xfe, 0x00]),
            DocumentInput::new("empty.md", "   "),
            DocumentInput::new("cards.md", CARDS),
        ];

        let report = kb.load_documents(&files).await;
        assert_eq!(report.loaded_files, 2);
        assert_eq!(report.failed_files, 2);
        assert!(report.total_chunks >= 2);
        assert!(report.files[1].error.is_some());
        assert_eq!(kb.stats().unwrap().sources_count, 2);
    }

    #[tokio::test]
    async fn test_ingest_path_walks_supported_files() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(docs.join("nested")).unwrap();
        std::fs::write(docs.join("mortgage.md"), MORTGAGE).unwrap();
        std::fs::write(docs.join("nested/cards.html"), format!("<p>{}</p>", CARDS)).unwrap();
        std::fs::write(docs.join("photo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let kb = knowledge_base();
        let report = kb.ingest_path(&docs).await.unwrap();

        assert_eq!(report.loaded_files, 2);
        assert_eq!(report.failed_files, 0);
    }

    #[tokio::test]
    async fn test_ingest_path_missing() {
        let kb = knowledge_base();
        assert!(kb.ingest_path(Path::new("/definitely/not/here")).await.is_err());
    }

    #[tokio::test]
    async fn test_clean_and_persisted_stats() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data/index.sqlite");

        {
            let kb = KnowledgeBase::open(&path, settings(), Arc::new(HashedProvider::new(64))).unwrap();
            kb.ingest_bytes("cards.md", CARDS.as_bytes()).await.unwrap();
        }

        let kb = KnowledgeBase::open(&path, settings(), Arc::new(HashedProvider::new(64))).unwrap();
        let stats = kb.stats().unwrap();
        assert_eq!(stats.sources_count, 1);
        assert!(stats.db_size_bytes > 0);
        assert!(stats.last_ingested_at.is_some());

        kb.clean().unwrap();
        assert!(kb.is_empty().unwrap());
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
