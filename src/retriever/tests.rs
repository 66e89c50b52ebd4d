use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::*;
use crate::embeddings::StubEmbedder;

fn test_retriever() -> (Retriever, Arc<VectorIndex>, Arc<StubEmbedder>) {
    let index = Arc::new(VectorIndex::new());
    let embedder = Arc::new(StubEmbedder::default());
    let retriever = Retriever::new(
        Arc::clone(&index),
        Arc::clone(&embedder) as Arc<dyn TextEmbedder>,
        "docs_embeddings",
        Distance::Cosine,
    );
    (retriever, index, embedder)
}

#[test]
fn single_chunk_document_produces_one_record() {
    let (retriever, index, _) = test_retriever();
    let document = Document::new(
        "kb://1",
        "UltraTech Super cement costs approximately 415 per bag.",
    );

    let report = retriever.ingest(&document, 900).expect("ingest should succeed");

    assert_eq!(report.chunks_total, 1);
    assert_eq!(report.chunks_indexed, 1);
    assert_eq!(index.count("docs_embeddings").expect("collection exists"), 1);
}

#[test]
fn reingestion_is_idempotent() {
    let (retriever, index, _) = test_retriever();
    let document = Document::new("kb://pricing", "Cement pricing details. ".repeat(100));

    let first = retriever.ingest(&document, 300).expect("first ingest");
    let count_after_first = index.count("docs_embeddings").expect("collection exists");

    let second = retriever.ingest(&document, 300).expect("second ingest");
    let count_after_second = index.count("docs_embeddings").expect("collection exists");

    assert_eq!(first, second);
    assert_eq!(count_after_first, count_after_second);
}

#[test]
fn whitespace_chunks_are_skipped() {
    let (retriever, index, _) = test_retriever();
    // Padding makes the second window whitespace-only.
    let text = format!("{}{}", "real content here", " ".repeat(40));
    let document = Document::new("kb://sparse", text);

    let report = retriever.ingest(&document, 20).expect("ingest should succeed");

    assert!(report.chunks_indexed < report.chunks_total);
    assert_eq!(
        index.count("docs_embeddings").expect("collection exists"),
        report.chunks_indexed
    );
}

#[test]
fn embedding_failure_leaves_no_partial_records() {
    let (retriever, index, embedder) = test_retriever();
    // Probe succeeds during a prior ingest so the collection exists.
    retriever
        .ingest(&Document::new("kb://seed", "seed content"), 900)
        .expect("seed ingest should succeed");
    let count_before = index.count("docs_embeddings").expect("collection exists");

    embedder.fail_next.store(true, Ordering::SeqCst);
    let result = retriever.ingest(
        &Document::new("kb://big", "lots of content ".repeat(200)),
        100,
    );

    assert!(matches!(
        result,
        Err(SupportError::ExternalService {
            capability: Capability::Embedding,
            ..
        })
    ));
    assert_eq!(
        index.count("docs_embeddings").expect("collection exists"),
        count_before
    );
}

#[test]
fn answer_context_finds_ingested_chunk() {
    let (retriever, _, _) = test_retriever();
    let document = Document::new(
        "kb://1",
        "UltraTech Super cement costs approximately 415 per bag.",
    );
    retriever.ingest(&document, 900).expect("ingest should succeed");

    let outcome = retriever
        .answer_context("What is the price of UltraTech Super?", 3)
        .expect("retrieval should succeed");

    let RetrievalOutcome::Hits(result) = outcome else {
        panic!("expected hits, got NoRelevantContent");
    };
    assert_eq!(result.sources, vec!["kb://1".to_string()]);
    assert!(result.chunks[0].text.contains("415"));
}

#[test]
fn empty_index_signals_no_relevant_content() {
    let (retriever, _, _) = test_retriever();

    let outcome = retriever
        .answer_context("What is the price?", 3)
        .expect("retrieval on an empty index is not an error");

    assert_eq!(outcome, RetrievalOutcome::NoRelevantContent);
}

#[test]
fn zero_top_k_is_invalid() {
    let (retriever, _, embedder) = test_retriever();

    let result = retriever.answer_context("anything", 0);
    assert!(matches!(result, Err(SupportError::InvalidArgument(_))));
    // Rejected before any capability call.
    assert_eq!(embedder.call_count(), 0);
}

#[test]
fn sources_are_deduplicated_in_first_seen_order() {
    let (retriever, _, _) = test_retriever();
    retriever
        .ingest(
            &Document::new("kb://a", "cement price cement price cement price".repeat(4)),
            40,
        )
        .expect("ingest a");
    retriever
        .ingest(&Document::new("kb://b", "unrelated topic entirely"), 900)
        .expect("ingest b");

    let outcome = retriever
        .answer_context("cement price", 5)
        .expect("retrieval should succeed");

    let RetrievalOutcome::Hits(result) = outcome else {
        panic!("expected hits");
    };
    // Multiple chunks from kb://a collapse to one source entry.
    let from_a = result.sources.iter().filter(|s| *s == "kb://a").count();
    assert_eq!(from_a, 1);
    assert_eq!(result.sources.len(), result.sources.iter().collect::<std::collections::HashSet<_>>().len());
}

#[test]
fn deterministic_ids_are_stable() {
    assert_eq!(
        chunk_record_id("kb://1", 0),
        chunk_record_id("kb://1", 0)
    );
    assert_ne!(
        chunk_record_id("kb://1", 0),
        chunk_record_id("kb://1", 1)
    );
    assert_ne!(
        chunk_record_id("kb://1", 0),
        chunk_record_id("kb://2", 0)
    );
}
