//! Property tests for word-window chunking.

use legalrag::chunking::chunk;
use legalrag::normalize::normalize;
use legalrag::{Chunker, Document, WordWindowChunker};
use proptest::prelude::*;

/// Words separated by arbitrary runs of whitespace.
fn arb_text() -> impl Strategy<Value = (Vec<String>, String)> {
    proptest::collection::vec(("[a-z]{1,8}", "[ \t\n]{1,3}"), 0..120).prop_map(|pairs| {
        let words: Vec<String> = pairs.iter().map(|(w, _)| w.clone()).collect();
        let text: String = pairs.iter().map(|(w, sep)| format!("{sep}{w}")).collect();
        (words, text)
    })
}

/// Valid `(chunk_size, overlap)` pairs with `overlap < chunk_size`.
fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

/// Property: chunk coverage.
/// Concatenating the first chunk with every later chunk minus its leading
/// `overlap` words reproduces the normalized word sequence exactly.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reassemble_to_original_words(
            (words, text) in arb_text(),
            (size, overlap) in arb_window(),
        ) {
            let chunks = chunk("doc", "Doc", &normalize(&text), size, overlap).unwrap();

            if words.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            let mut rebuilt: Vec<String> = Vec::new();
            for (i, c) in chunks.iter().enumerate() {
                let chunk_words: Vec<&str> = c.content.split(' ').collect();
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(chunk_words[skip..].iter().map(|w| w.to_string()));
            }
            prop_assert_eq!(rebuilt, words);
        }
    }
}

/// Property: window bound and identity.
/// Every chunk has between 1 and `chunk_size` words, indices are dense from
/// zero, ids follow `{doc_id}_chunk_{index}`, and offsets are increasing.
mod prop_window_bound {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_respect_window_and_naming(
            (_, text) in arb_text(),
            (size, overlap) in arb_window(),
        ) {
            let chunker = WordWindowChunker::new(size, overlap).unwrap();
            let doc = Document::new("lease", "Lease", text, "generated");
            let chunks = chunker.chunk(&doc);

            for (i, c) in chunks.iter().enumerate() {
                let count = c.word_count();
                prop_assert!(count >= 1 && count <= size);
                prop_assert_eq!(c.chunk_index, i);
                prop_assert_eq!(&c.chunk_id, &format!("lease_chunk_{i}"));
                prop_assert_eq!(&c.source_title, "Lease");
                prop_assert!(c.start_char <= c.end_char);
            }
            for pair in chunks.windows(2) {
                prop_assert!(pair[0].start_char < pair[1].start_char);
            }
        }
    }
}
