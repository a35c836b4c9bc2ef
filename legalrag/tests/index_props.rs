//! Property tests for exact vector search and index persistence.

use legalrag::document::Chunk;
use legalrag::{Metric, VectorIndex};
use proptest::prelude::*;

const DIM: usize = 8;

fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, DIM)
}

fn arb_metric() -> impl Strategy<Value = Metric> {
    prop_oneof![Just(Metric::L2), Just(Metric::Cosine)]
}

fn chunk(i: usize) -> Chunk {
    Chunk {
        chunk_id: format!("doc_chunk_{i}"),
        content: format!("clause {i}"),
        source_doc_id: "doc".to_string(),
        source_title: "Doc".to_string(),
        chunk_index: i,
        start_char: 0,
        end_char: 0,
        metadata: Default::default(),
    }
}

fn build(vectors: &[Vec<f32>], metric: Metric) -> VectorIndex {
    let mut index = VectorIndex::new(DIM, metric).unwrap();
    index.add(vectors, (0..vectors.len()).map(chunk).collect()).unwrap();
    index
}

/// Property: search ordering and count.
/// A search returns exactly `min(k, n)` distinct positions, ordered by
/// increasing distance for `l2` and decreasing similarity for `cosine`, and
/// the converted similarity never exceeds one.
mod prop_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn returns_min_k_n_in_metric_order(
            vectors in proptest::collection::vec(arb_vector(), 0..30),
            query in arb_vector(),
            k in 0usize..40,
            metric in arb_metric(),
        ) {
            let index = build(&vectors, metric);
            let hits = index.search(&query, k).unwrap();

            prop_assert_eq!(hits.len(), k.min(vectors.len()));

            let mut positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
            positions.sort_unstable();
            positions.dedup();
            prop_assert_eq!(positions.len(), hits.len());

            for pair in hits.windows(2) {
                match metric {
                    Metric::L2 => prop_assert!(pair[0].score <= pair[1].score),
                    Metric::Cosine => prop_assert!(pair[0].score >= pair[1].score),
                }
            }
            for hit in &hits {
                prop_assert!(metric.similarity(hit.score) <= 1.0 + 1e-5);
            }
        }
    }
}

/// Property: stored vectors are their own nearest neighbor under `l2`.
mod prop_self_match {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn stored_vector_scores_zero_distance(
            vectors in proptest::collection::vec(arb_vector(), 1..20),
            pick in any::<prop::sample::Index>(),
        ) {
            let index = build(&vectors, Metric::L2);
            let target = pick.index(vectors.len());
            let hits = index.search(&vectors[target], 1).unwrap();

            prop_assert_eq!(hits[0].score, 0.0);
            prop_assert_eq!(Metric::L2.similarity(hits[0].score), 1.0);
        }
    }
}

/// Property: save/load round-trip.
/// A reloaded index has the same size, dimension, metric and metadata, and
/// answers the same query with the same hits.
mod prop_persistence {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(25))]

        #[test]
        fn reloaded_index_searches_identically(
            vectors in proptest::collection::vec(arb_vector(), 0..15),
            query in arb_vector(),
            metric in arb_metric(),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("faiss_index.bin");
            let index = build(&vectors, metric);
            index.save(&path).unwrap();

            let loaded = VectorIndex::load(&path).unwrap();
            prop_assert_eq!(loaded.len(), index.len());
            prop_assert_eq!(loaded.embedding_dim(), DIM);
            prop_assert_eq!(loaded.metric(), metric);
            prop_assert_eq!(loaded.chunks(), index.chunks());
            prop_assert_eq!(loaded.search(&query, 5).unwrap(), index.search(&query, 5).unwrap());
        }
    }
}
