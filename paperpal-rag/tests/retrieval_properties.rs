//! Property tests for chunking and ranking.

use paperpal_rag::SentenceChunker;
use paperpal_rag::index::ChunkIndex;
use paperpal_rag::pipeline::assemble_pages;
use paperpal_rag::scoring;
use proptest::prelude::*;

/// Page text mixing English words, sentence breaks, and CJK characters.
fn arb_page() -> impl Strategy<Value = String> {
    "[a-zA-Z .!?\n注意力机制实验]{0,400}"
}

/// Page-marked paper text that is not blank.
fn arb_paper_text() -> impl Strategy<Value = (Vec<String>, String)> {
    proptest::collection::vec(arb_page(), 1..8)
        .prop_map(|pages| {
            let text = assemble_pages(&pages);
            (pages, text)
        })
        .prop_filter("non-blank text", |(_, text)| !text.trim().is_empty())
}

fn arb_chunker() -> impl Strategy<Value = SentenceChunker> {
    (20usize..400, 0usize..300).prop_map(|(size, overlap)| SentenceChunker::new(size, overlap))
}

/// **Property 1: Chunk validity**
/// *For any* non-blank text, every chunk SHALL have trimmed non-empty content
/// no longer than `chunk_size` characters, an id of the form
/// `{paper_id}_chunk_{index}`, and a page number within the text's pages.
mod prop_chunk_validity {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_are_well_formed(
            (pages, text) in arb_paper_text(),
            chunker in arb_chunker(),
        ) {
            let chunks = chunker.chunk(&text, "paper").unwrap();
            prop_assert!(!chunks.is_empty());

            for chunk in &chunks {
                prop_assert!(!chunk.content().is_empty());
                prop_assert_eq!(chunk.content(), chunk.content().trim());
                prop_assert!(chunk.content().chars().count() <= chunker.chunk_size());
                prop_assert_eq!(chunk.paper_id(), "paper");
                let expected_id = format!("paper_chunk_{}", chunk.chunk_index());
                prop_assert_eq!(chunk.id(), expected_id.as_str());
                prop_assert!(chunk.page_number() >= 1);
                prop_assert!(chunk.page_number() as usize <= pages.len());
            }
        }
    }
}

/// **Property 2: Chunk ordering**
/// *For any* chunking, chunk indices SHALL run 0, 1, 2, … without gaps and
/// page numbers SHALL never decrease.
mod prop_chunk_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn indices_sequential_and_pages_monotonic(
            (_, text) in arb_paper_text(),
            chunker in arb_chunker(),
        ) {
            let chunks = chunker.chunk(&text, "paper").unwrap();
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.chunk_index(), i);
            }
            for pair in chunks.windows(2) {
                prop_assert!(pair[0].page_number() <= pair[1].page_number());
            }
        }
    }
}

/// **Property 3: Coverage without fabrication**
/// *For any* chunking, every chunk SHALL be a verbatim slice of the input,
/// the first chunk SHALL begin where the trimmed text begins, and the last
/// chunk SHALL end where the trimmed text ends.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_are_slices_spanning_the_text(
            (_, text) in arb_paper_text(),
            chunker in arb_chunker(),
        ) {
            let chunks = chunker.chunk(&text, "paper").unwrap();
            for chunk in &chunks {
                prop_assert!(text.contains(chunk.content()));
            }

            let first = chunks.first().unwrap();
            let last = chunks.last().unwrap();
            prop_assert!(text.trim_start().starts_with(first.content()));
            prop_assert!(text.trim_end().ends_with(last.content()));
        }
    }
}

/// **Property 4: Determinism**
/// *For any* text and query, chunking and searching twice SHALL give
/// identical results.
mod prop_determinism {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn chunking_and_search_repeat_exactly(
            (_, text) in arb_paper_text(),
            chunker in arb_chunker(),
            query in "[a-zA-Z 注意力机制实验方法]{0,20}",
        ) {
            let chunks = chunker.chunk(&text, "paper").unwrap();
            prop_assert_eq!(&chunks, &chunker.chunk(&text, "paper").unwrap());

            let dir = tempfile::tempdir().unwrap();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (first, second) = rt.block_on(async {
                let index = ChunkIndex::open(dir.path()).await.unwrap();
                index.store("paper", chunks).await.unwrap();
                (index.search("paper", &query, 5), index.search("paper", &query, 5))
            });
            prop_assert_eq!(first, second);
        }
    }
}

/// **Property 5: Ranking order**
/// *For any* scored candidates, ranking SHALL keep only positive scores,
/// return at most `top_k` of them in descending order, and keep input order
/// among equal scores.
mod prop_ranking_order {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn ranked_descending_stable_and_bounded(
            scores in proptest::collection::vec(prop_oneof![Just(0.0f64), Just(0.5), 0.0f64..2.0], 0..30),
            top_k in 0usize..40,
        ) {
            let ranked = scoring::rank(scores.iter().copied().enumerate(), top_k);

            let positive = scores.iter().filter(|score| **score > 0.0).count();
            prop_assert_eq!(ranked.len(), positive.min(top_k));
            for (_, score) in &ranked {
                prop_assert!(*score > 0.0);
            }
            for pair in ranked.windows(2) {
                let ((i, a), (j, b)) = (pair[0], pair[1]);
                prop_assert!(a >= b);
                if a == b {
                    prop_assert!(i < j);
                }
            }
        }

        #[test]
        fn index_scores_descending_and_bounded(
            (_, text) in arb_paper_text(),
            query in "[a-zA-Z 注意力机制实验]{1,20}",
            top_k in 1usize..10,
        ) {
            let chunks = SentenceChunker::new(80, 20).chunk(&text, "paper").unwrap();
            let dir = tempfile::tempdir().unwrap();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let hits = rt.block_on(async {
                let index = ChunkIndex::open(dir.path()).await.unwrap();
                index.store("paper", chunks).await.unwrap();
                index.search_scored("paper", &query, top_k)
            });

            prop_assert!(hits.len() <= top_k);
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
