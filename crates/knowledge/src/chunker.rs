//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;
use teller_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Chunk text into overlapping segments.
///
/// Capacity and overlap are measured in characters. The splitter prefers
/// paragraph, sentence and word boundaries before falling back to raw
/// characters, and each chunk records the byte range it was taken from.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    if chunk_size == 0 {
        return Err(AppError::Knowledge("Chunk size must be positive".to_string()));
    }

    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| {
            AppError::Knowledge(format!(
                "Invalid chunk settings (size {}, overlap {}): {}",
                chunk_size, overlap, e
            ))
        })?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .enumerate()
        .map(|(position, (start, chunk))| ChunkCandidate {
            source_id: source_id.to_string(),
            position: position as u32,
            text: chunk.to_string(),
            metadata: serde_json::json!({
                "start": start,
                "end": start + chunk.len(),
            }),
        })
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_basic() {
        let text = "Savings accounts earn interest monthly. ".repeat(50);
        let chunks = chunk_text("test-source", &text, 200, 50).unwrap();

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[1].position, 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 200);
            assert_eq!(chunk.source_id, "test-source");
        }
    }

    #[test]
    fn test_chunk_text_short_text_is_one_chunk() {
        let chunks = chunk_text("s", "Opening hours are 9 to 5.", 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Opening hours are 9 to 5.");
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("test-source", "", 100, 10).unwrap().is_empty());
        assert!(chunk_text("test-source", "  \n\t ", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_metadata_is_byte_range() {
        let text = "第一段：开户需要身份证。\n\n第二段：贷款需要收入证明。".repeat(20);
        let chunks = chunk_text("s", &text, 40, 5).unwrap();

        for chunk in &chunks {
            let start = chunk.metadata["start"].as_u64().unwrap() as usize;
            let end = chunk.metadata["end"].as_u64().unwrap() as usize;
            assert_eq!(&text[start..end], chunk.text);
        }
    }

    #[test]
    fn test_chunk_text_with_overlap() {
        let text = (0..200).map(|i| format!("w{} ", i)).collect::<String>();
        let chunks = chunk_text("test-source", &text, 50, 20).unwrap();
        assert!(chunks.len() >= 2);

        let first_end = chunks[0].metadata["end"].as_u64().unwrap();
        let second_start = chunks[1].metadata["start"].as_u64().unwrap();
        assert!(second_start < first_end, "Expected overlap between chunks");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(chunk_text("s", "some text", 10, 10).is_err());
        assert!(chunk_text("s", "some text", 0, 0).is_err());
    }
}
