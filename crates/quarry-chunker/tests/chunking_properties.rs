//! Property and integration tests for quarry-chunker
//!
//! The word tokenizer makes token counts exact, so size bounds and overlap
//! coverage can be checked precisely.

use proptest::prelude::*;
use quarry_chunker::{ChunkArchive, ChunkerConfig, ChunkingEngine, Tokenizer, WordTokenizer};
use quarry_domain::{ChunkStrategy, ObjectStore};
use quarry_store::MemoryObjectStore;
use std::sync::Arc;

fn engine(max_tokens: usize, overlap_tokens: usize) -> ChunkingEngine {
    ChunkingEngine::new(
        Arc::new(WordTokenizer),
        ChunkerConfig {
            max_tokens,
            overlap_tokens,
            chars_per_token: 3,
        },
    )
    .unwrap()
}

fn section(index: usize, words: usize) -> String {
    let body = (0..words)
        .map(|j| format!("w{}x{}", index, j))
        .collect::<Vec<_>>()
        .join(" ");
    format!("## H{}\n{}", index, body)
}

proptest! {
    #[test]
    fn prop_fitting_document_is_returned_whole(words in proptest::collection::vec("[a-z]{1,8}", 1..40)) {
        let text = words.join(" ");
        let engine = engine(40, 4);
        let result = engine.chunk("P", "doc.txt", &text);
        prop_assert_eq!(result.chunks.len(), 1);
        prop_assert_eq!(&result.chunks[0].text, &text);
        prop_assert_eq!(result.strategy, ChunkStrategy::None);
    }

    #[test]
    fn prop_chunks_respect_limit_and_are_contiguous(
        sizes in proptest::collection::vec(1usize..60, 1..15),
        max in 8usize..40,
    ) {
        let text = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| section(i, n))
            .collect::<Vec<_>>()
            .join("\n\n");
        let engine = engine(max, max / 4);
        let result = engine.chunk("P", "doc.txt", &text);

        for (i, chunk) in result.chunks.iter().enumerate() {
            prop_assert_eq!(chunk.ordinal, i);
            prop_assert!(chunk.token_count <= max);
            prop_assert_eq!(chunk.token_count, WordTokenizer.count_tokens(&chunk.text));
        }
    }

    #[test]
    fn prop_trimming_overlap_reconstructs_all_sections(
        sizes in proptest::collection::vec(2usize..=34, 1..12),
    ) {
        let max = 40;
        let overlap = 4;
        let text = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| section(i, n))
            .collect::<Vec<_>>()
            .join("\n\n");

        let result = engine(max, overlap).chunk("P", "doc.txt", &text);

        let mut rebuilt: Vec<&str> = Vec::new();
        for (i, chunk) in result.chunks.iter().enumerate() {
            let words: Vec<&str> = chunk.text.split_whitespace().collect();
            let skip = if i == 0 { 0 } else { overlap };
            rebuilt.extend(&words[skip..]);
        }
        let expected: Vec<&str> = text.split_whitespace().collect();
        prop_assert_eq!(rebuilt, expected);
    }
}

#[test]
fn test_twenty_thousand_tokens_fit_default_limit() {
    let text = (0..20_000).map(|i| format!("t{}", i)).collect::<Vec<_>>().join(" ");
    let engine = ChunkingEngine::new(Arc::new(WordTokenizer), ChunkerConfig::default()).unwrap();
    let result = engine.chunk("P", "ROP-big.txt", &text);
    assert_eq!(result.total_tokens, 20_000);
    assert_eq!(result.chunks.len(), 1);
}

#[test]
fn test_archive_round_trip_and_chunked_check() {
    let store = MemoryObjectStore::new();
    let archive = ChunkArchive::new(&store);
    assert!(!archive.is_chunked("P", "ROP-a.txt").unwrap());

    let text = (0..6).map(|i| section(i, 10)).collect::<Vec<_>>().join("\n\n");
    let result = engine(20, 2).chunk("P", "ROP-a.txt", &text);
    assert!(result.chunks.len() > 1);

    let keys = archive.save(&result.chunks).unwrap();
    assert_eq!(keys[0], "P/chunks/ROP-a_chunk_000.json");
    assert!(store.exists("P/chunks/ROP-a_chunk_001.json").unwrap());
    assert!(archive.is_chunked("P", "ROP-a.txt").unwrap());

    let loaded = archive.load("P", "ROP-a.txt").unwrap();
    assert_eq!(loaded, result.chunks);
}
