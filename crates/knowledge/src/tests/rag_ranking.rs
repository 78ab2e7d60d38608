//! Tests for RAG ranking correctness.

use crate::index::{init_memory_index, insert_chunk, insert_source, query_chunks};
use crate::types::{KnowledgeChunk, KnowledgeSource};
use chrono::Utc;
use rusqlite::Connection;

/// Helper to create a test chunk with embedding.
fn create_test_chunk(id: &str, text: &str, embedding: Vec<f32>) -> KnowledgeChunk {
    KnowledgeChunk {
        id: id.to_string(),
        source_id: "source1".to_string(),
        position: 0,
        text: text.to_string(),
        embedding: Some(embedding),
        metadata: serde_json::json!({}),
    }
}

/// Helper to create a normalized embedding.
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn index_with_source() -> Connection {
    let conn = init_memory_index().unwrap();
    insert_source(
        &conn,
        &KnowledgeSource {
            id: "source1".to_string(),
            name: "products.md".to_string(),
            content_hash: "hash1".to_string(),
            content_type: "markdown".to_string(),
            size_bytes: 100,
            ingested_at: Utc::now(),
        },
    )
    .unwrap();
    conn
}

#[test]
fn test_relevant_query_returns_high_scores() {
    let conn = index_with_source();

    let loan_chunk = create_test_chunk(
        "chunk1",
        "Mortgage applications need proof of income",
        normalize(&[1.0, 0.5, 0.2, 0.1]),
    );
    let unrelated_chunk = create_test_chunk(
        "chunk2",
        "Branch parking is free on weekends",
        normalize(&[-0.3, -0.8, 0.4, -0.2]),
    );

    insert_chunk(&conn, &loan_chunk).unwrap();
    insert_chunk(&conn, &unrelated_chunk).unwrap();

    let query_embedding = normalize(&[0.9, 0.4, 0.3, 0.1]);
    let results = query_chunks(&conn, &query_embedding, 5).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.id, "chunk1", "Most relevant chunk should be first");
    assert!(
        results[0].score > 0.8,
        "Relevant chunk score should be high: {}",
        results[0].score
    );
    assert!(results[0].score > results[1].score, "Scores should be ordered");
}

#[test]
fn test_unrelated_query_returns_low_scores() {
    let conn = index_with_source();

    insert_chunk(
        &conn,
        &create_test_chunk("chunk1", "Credit card annual fee", normalize(&[1.0, 0.0, 0.0, 0.0])),
    )
    .unwrap();

    let query_embedding = normalize(&[0.0, 1.0, 0.0, 0.0]);
    let results = query_chunks(&conn, &query_embedding, 5).unwrap();

    assert_eq!(results.len(), 1);
    assert!(
        results[0].score < 0.5,
        "Unrelated chunk score should be low: {}",
        results[0].score
    );
}

#[test]
fn test_scores_are_ordered_descending() {
    let conn = index_with_source();

    let chunks = vec![
        create_test_chunk("chunk1", "Text A", normalize(&[1.0, 0.0, 0.0])),
        create_test_chunk("chunk2", "Text B", normalize(&[0.7, 0.7, 0.0])),
        create_test_chunk("chunk3", "Text C", normalize(&[0.0, 1.0, 0.0])),
        create_test_chunk("chunk4", "Text D", normalize(&[-1.0, 0.0, 0.0])),
    ];
    for chunk in chunks {
        insert_chunk(&conn, &chunk).unwrap();
    }

    let results = query_chunks(&conn, &normalize(&[1.0, 0.0, 0.0]), 10).unwrap();

    for pair in results.windows(2) {
        assert!(
            pair[0].score >= pair[1].score,
            "Scores should be ordered: {} >= {}",
            pair[0].score,
            pair[1].score
        );
    }

    assert_eq!(results[0].chunk.id, "chunk1");
    assert!(results[0].score > 0.99, "Perfect match should have score near 1.0");
    assert!(results[3].score < -0.9, "Opposite vectors should be close to -1.0");
}

#[test]
fn test_empty_index_returns_no_results() {
    let conn = init_memory_index().unwrap();
    let results = query_chunks(&conn, &normalize(&[1.0, 0.0, 0.0]), 5).unwrap();
    assert!(results.is_empty(), "Empty index should return no results");
}

#[test]
fn test_top_k_limit_respected() {
    let conn = index_with_source();

    for i in 0..10 {
        let chunk = create_test_chunk(
            &format!("chunk{}", i),
            &format!("Text {}", i),
            normalize(&[1.0, i as f32 / 10.0, 0.0]),
        );
        insert_chunk(&conn, &chunk).unwrap();
    }

    let results = query_chunks(&conn, &normalize(&[1.0, 0.0, 0.0]), 3).unwrap();

    assert_eq!(results.len(), 3, "Should return exactly top_k results");
    assert_eq!(results[0].chunk.id, "chunk0");
}
